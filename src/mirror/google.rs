//! Implements the `Sheet` trait using the `sheets::Client` to talk to a Google sheet.

use crate::error::Res;
use crate::mirror::{Sheet, SheetRange, TokenProvider};
use anyhow::Context;
use serde::Deserialize;
use serde_json::json;
use sheets::types::{
    BatchClearValuesRequest, BatchUpdateSpreadsheetRequest, BatchUpdateValuesRequest,
    DateTimeRenderOption, Dimension, ValueInputOption, ValueRange, ValueRenderOption,
};
use sheets::ClientError;
use tracing::trace;

/// Talks to one Google spreadsheet. It holds a `TokenProvider` and rebuilds the client before
/// every call so the access token is refreshed when needed.
pub(super) struct GoogleSheet {
    spreadsheet_id: String,
    token_provider: TokenProvider,
    client: sheets::Client,
}

impl GoogleSheet {
    pub(super) async fn new(
        spreadsheet_id: impl Into<String>,
        mut token_provider: TokenProvider,
    ) -> Res<Self> {
        let client = create_sheets_client(&mut token_provider).await?;
        Ok(Self {
            spreadsheet_id: spreadsheet_id.into(),
            token_provider,
            client,
        })
    }

    /// Refreshes the sheets client with a new access token if needed
    async fn refresh_client(&mut self) -> Res<()> {
        self.client = create_sheets_client(&mut self.token_provider).await?;
        Ok(())
    }
}

/// The part of a spreadsheet resource the mirror reads: the title of every tab.
#[derive(Debug, Default, Deserialize)]
struct TabList {
    #[serde(default)]
    sheets: Vec<TabEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct TabEntry {
    #[serde(default)]
    properties: TabProperties,
}

#[derive(Debug, Default, Deserialize)]
struct TabProperties {
    #[serde(default)]
    title: String,
}

impl TabList {
    fn titles(self) -> Vec<String> {
        self.sheets
            .into_iter()
            .map(|s| s.properties.title)
            .filter(|title| !title.is_empty())
            .collect()
    }
}

/// The generated request type has an optional member for every kind of spreadsheet update, so it
/// is built from its JSON form.
fn add_tabs_request(names: &[String]) -> Res<BatchUpdateSpreadsheetRequest> {
    let requests: Vec<_> = names
        .iter()
        .map(|name| json!({ "addSheet": { "properties": { "title": name } } }))
        .collect();
    serde_json::from_value(json!({ "requests": requests }))
        .context("Unable to build the add sheets request")
}

#[async_trait::async_trait]
impl Sheet for GoogleSheet {
    async fn get(&mut self, tab: &str) -> Res<Vec<Vec<String>>> {
        trace!("get for {tab}");
        self.refresh_client().await?;
        let range = format!("{}!A:ZZ", quote(tab));
        let response = self
            .client
            .spreadsheets()
            .values_get(
                &self.spreadsheet_id,
                &range,
                DateTimeRenderOption::FormattedString,
                Dimension::Rows,
                ValueRenderOption::FormattedValue,
            )
            .await
            .map_err(map_client_error)
            .with_context(|| format!("Failed to fetch the '{tab}' tab"))?;
        Ok(response.body.values)
    }

    async fn tabs(&mut self) -> Res<Vec<String>> {
        self.refresh_client().await?;
        let response = self
            .client
            .spreadsheets()
            .get(&self.spreadsheet_id, false, &[])
            .await
            .map_err(map_client_error)
            .context("Failed to fetch the spreadsheet properties")?;
        let value = serde_json::to_value(&response.body)
            .context("Unable to read the spreadsheet properties")?;
        let tabs: TabList =
            serde_json::from_value(value).context("Unable to read the tab titles")?;
        Ok(tabs.titles())
    }

    async fn add_tabs(&mut self, names: &[String]) -> Res<()> {
        if names.is_empty() {
            return Ok(());
        }
        trace!("add_tabs {names:?}");
        self.refresh_client().await?;
        let request = add_tabs_request(names)?;
        self.client
            .spreadsheets()
            .batch_update(&self.spreadsheet_id, &request)
            .await
            .map_err(map_client_error)
            .with_context(|| format!("Failed to add the tabs {names:?}"))?;
        Ok(())
    }

    async fn clear_ranges(&mut self, ranges: &[String]) -> Res<()> {
        self.refresh_client().await?;
        let request = BatchClearValuesRequest {
            ranges: ranges.to_vec(),
        };
        self.client
            .spreadsheets()
            .values_batch_clear(&self.spreadsheet_id, &request)
            .await
            .map_err(map_client_error)
            .with_context(|| format!("Failed to clear ranges: {ranges:?}"))?;
        Ok(())
    }

    async fn write_ranges(&mut self, data: &[SheetRange]) -> Res<()> {
        self.refresh_client().await?;
        let value_ranges: Vec<ValueRange> = data
            .iter()
            .map(|sr| ValueRange {
                major_dimension: Some(Dimension::Rows),
                range: sr.range.clone(),
                values: sr.values.clone(),
            })
            .collect();
        // Raw keeps dates and amounts as the text we wrote and never evaluates a formula
        let request = BatchUpdateValuesRequest {
            data: value_ranges,
            include_values_in_response: Some(false),
            response_date_time_render_option: None,
            response_value_render_option: None,
            value_input_option: Some(ValueInputOption::Raw),
        };
        self.client
            .spreadsheets()
            .values_batch_update(&self.spreadsheet_id, &request)
            .await
            .map_err(map_client_error)
            .context("Failed to write ranges")?;
        Ok(())
    }
}

/// Creates a new sheets client with a refreshed access token.
async fn create_sheets_client(token_provider: &mut TokenProvider) -> Res<sheets::Client> {
    let access_token = token_provider.token_with_refresh().await?;
    // Only the access token is used; the refresh is handled by the `TokenProvider`
    Ok(sheets::Client::new(
        String::new(),
        String::new(),
        String::new(),
        access_token.to_string(),
        String::new(),
    ))
}

fn map_client_error(e: ClientError) -> anyhow::Error {
    let error_name = match &e {
        ClientError::EmptyRefreshToken => "EmptyRefreshToken".to_string(),
        ClientError::FromUtf8Error(inner) => format!("FromUtf8Error {inner}"),
        ClientError::UrlParserError(inner) => format!("UrlParserError {inner}"),
        ClientError::SerdeJsonError(inner) => format!("SerdeJsonError {inner}"),
        ClientError::ReqwestError(inner) => format!("ReqwestError {inner}"),
        ClientError::InvalidHeaderValue(inner) => format!("InvalidHeaderValue {inner}"),
        ClientError::ReqwestMiddleWareError(inner) => format!("ReqwestMiddleWareError {inner}"),
        ClientError::HttpError { .. } => "HttpError".to_string(),
        ClientError::Other(_) => "Other".to_string(),
    };
    anyhow::Error::new(e).context(error_name)
}

/// Quotes a tab name for A1 notation, e.g. `'January 2024'`.
pub(super) fn quote(tab: &str) -> String {
    format!("'{}'", tab.replace('\'', "''"))
}
