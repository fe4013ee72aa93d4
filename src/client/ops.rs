//! One convenience method per remote operation.
//!
//! Each method shapes its arguments and body into the operation's schema and
//! rejects id lists where the server accepts only one id. Bulk operations
//! fail on the first per-item status that isn't `"OK"`.

use serde::Deserialize;
use serde_json::Value;

use crate::app::{FeedctlError, Result};
use crate::client::ApiClient;
use crate::wire::{ApiArgs, Body, Ids};
use crate::xml::Element;

/// Where a search channel looks for matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchScope {
    pub titles: bool,
    pub descriptions: bool,
}

/// Knobs for [`ApiClient::search`].
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Locations to search, comma-joined on the wire when present.
    pub locations: Option<Vec<String>>,
    /// How result items are rendered, e.g. `"excerpt"`.
    pub results_format: String,
    pub advanced_syntax: bool,
    pub page: u32,
    pub page_size: u32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            locations: None,
            results_format: "excerpt".into(),
            advanced_syntax: false,
            page: 1,
            page_size: 10,
        }
    }
}

impl ApiClient {
    // ----- application info ---------------------------------------------

    pub async fn build_info(&self) -> Result<Value> {
        let body = self
            .call_checked("buildInfo", ApiArgs::json(), None, false)
            .await?;
        take_key(body.into_mapping()?, "buildInfo")
    }

    pub async fn user_info(&self) -> Result<Value> {
        let body = self
            .call_checked("userInfo", ApiArgs::json(), None, false)
            .await?;
        take_key(body.into_mapping()?, "userInfo")
    }

    pub async fn stats(&self) -> Result<Value> {
        let body = self.call_checked("stats", ApiArgs::json(), None, false).await?;
        take_key(body.into_mapping()?, "stats")
    }

    /// Tail of the application's activity log.
    pub async fn activity_log(&self, lines: Option<u32>) -> Result<String> {
        self.fetch_log("logs/activity", lines).await
    }

    /// Tail of the application's error log.
    pub async fn error_log(&self, lines: Option<u32>) -> Result<String> {
        self.fetch_log("logs/error", lines).await
    }

    async fn fetch_log(&self, name: &str, lines: Option<u32>) -> Result<String> {
        let mut args = ApiArgs::new();
        if let Some(lines) = lines {
            args.set("lines", lines);
        }
        let body = self.call_checked(name, args, None, true).await?;
        Ok(String::from_utf8_lossy(&body.into_raw()?).into_owned())
    }

    // ----- channel folders ----------------------------------------------

    pub async fn channel_folder_tree(&self) -> Result<Value> {
        let body = self
            .call_checked("channels/folders/tree", ApiArgs::json(), None, false)
            .await?;
        take_key(body.into_mapping()?, "channelFolder")
    }

    pub async fn channel_folders(&self) -> Result<Value> {
        let body = self
            .call_checked("channels/folders/list", ApiArgs::json(), None, false)
            .await?;
        take_key(body.into_mapping()?, "channelFolders")
    }

    pub async fn create_channel_folder(
        &self,
        name: &str,
        parent: Option<&str>,
        insert_after: Option<&str>,
    ) -> Result<i64> {
        let mut args = ApiArgs::json().with("name", name);
        if let Some(parent) = parent {
            args.set("parent", parent);
        }
        if let Some(after) = insert_after {
            args.set("after", after);
        }
        created_id(
            self.call_checked("channels/folders/create", args, None, false)
                .await?,
        )
    }

    pub async fn delete_channel_folder(&self, id: i64) -> Result<()> {
        self.call_checked(
            "channels/folders/delete",
            ApiArgs::json().with("id", id),
            None,
            false,
        )
        .await?;
        Ok(())
    }

    // ----- channel filters ----------------------------------------------

    pub async fn channel_filters(&self) -> Result<Value> {
        let body = self
            .call_checked("channels/filters/list", ApiArgs::json(), None, false)
            .await?;
        take_key(body.into_mapping()?, "channelFilters")
    }

    // ----- channels ------------------------------------------------------

    /// Configuration details for the given channels (all channels when no
    /// ids are given).
    pub async fn channels(&self, ids: Option<&Ids>, verbose: bool) -> Result<Value> {
        let args = ApiArgs::json().with("verbose", verbose).with_ids(ids);
        let body = self.call_checked("channels/list", args, None, false).await?;
        take_key(body.into_mapping()?, "channels")
    }

    pub async fn channel_stats(&self, ids: Option<&Ids>) -> Result<Value> {
        let args = ApiArgs::json().with_ids(ids);
        let body = self.call_checked("channels/stats", args, None, false).await?;
        take_key(body.into_mapping()?, "channels")
    }

    pub async fn channel_errors(&self, ids: Option<&Ids>) -> Result<Value> {
        let args = ApiArgs::json().with_ids(ids);
        let body = self.call_checked("channels/errors", args, None, false).await?;
        take_key(body.into_mapping()?, "channels")
    }

    /// Rendered HTML summary page for one channel.
    pub async fn channel_summary(&self, id: impl Into<Ids>) -> Result<Vec<u8>> {
        let id = single(id, "channels")?;
        let args = ApiArgs::new().with("format", "html").with_ids(Some(&id));
        self.call_checked("channels/get", args, None, false)
            .await?
            .into_raw()
    }

    /// Create a channel from a full configuration document.
    pub async fn create_channel(&self, config: &Element) -> Result<i64> {
        let config_xml = config.to_xml();
        created_id(
            self.call_checked("channels/create", ApiArgs::json(), Some(&config_xml), false)
                .await?,
        )
    }

    /// Create a plain channel subscribed to the given feed URL.
    pub async fn create_feed_channel(&self, feed_url: &str) -> Result<i64> {
        let config = Element::new("channel")
            .with_attr("type", "standard")
            .with_child(Element::new("feedUrl").with_text(feed_url));
        self.create_channel(&config).await
    }

    /// Create a channel backed by a plugin, with its parameters.
    pub async fn create_plugin_channel(
        &self,
        plugin_path: &str,
        params: &[(&str, &str)],
    ) -> Result<i64> {
        let mut plugin = Element::new("pluginChannel").with_attr("path", plugin_path);
        for (name, value) in params {
            plugin.children.push(
                Element::new("param")
                    .with_attr("name", *name)
                    .with_text(*value),
            );
        }
        let config = Element::new("channel")
            .with_attr("type", "plugin")
            .with_child(plugin);
        self.create_channel(&config).await
    }

    /// Create a channel backed by a saved search.
    pub async fn create_search_channel(
        &self,
        query: &str,
        scope: Option<SearchScope>,
        advanced_syntax: bool,
    ) -> Result<i64> {
        let mut search = Element::new("searchQuery")
            .with_attr("advancedSyntax", bool_str(advanced_syntax))
            .with_text(query);
        if let Some(scope) = scope {
            search.set_attr("searchInTitles", bool_str(scope.titles));
            search.set_attr("searchInDescriptions", bool_str(scope.descriptions));
        }
        let config = Element::new("channel")
            .with_attr("type", "search")
            .with_child(search);
        self.create_channel(&config).await
    }

    pub async fn delete_channels(&self, ids: impl Into<Ids>) -> Result<()> {
        let args = ApiArgs::json().with_ids(Some(&ids.into()));
        let body = self.call_checked("channels/delete", args, None, false).await?;
        check_bulk(&body.into_mapping()?, "channels", "delete channel")
    }

    // ----- reports -------------------------------------------------------

    pub async fn reports(&self, ids: Option<&Ids>, verbose: bool) -> Result<Value> {
        let args = ApiArgs::json().with("verbose", verbose).with_ids(ids);
        let body = self.call_checked("reports/list", args, None, false).await?;
        take_key(body.into_mapping()?, "channelReports")
    }

    pub async fn run_reports(&self, ids: impl Into<Ids>) -> Result<()> {
        let args = ApiArgs::json().with_ids(Some(&ids.into()));
        let body = self.call_checked("reports/run", args, None, false).await?;
        check_bulk(&body.into_mapping()?, "channelReports", "run report")
    }

    /// Run one report and return its rendered output.
    pub async fn report(&self, id: impl Into<Ids>) -> Result<Vec<u8>> {
        let id = single(id, "reports")?;
        let args = ApiArgs::new().with("format", "html").with_ids(Some(&id));
        self.call_checked("reports/get", args, None, false)
            .await?
            .into_raw()
    }

    pub async fn create_report(&self, config: &Element) -> Result<i64> {
        let config_xml = config.to_xml();
        created_id(
            self.call_checked("reports/create", ApiArgs::json(), Some(&config_xml), false)
                .await?,
        )
    }

    /// Create a report sourced from a named channel filter.
    pub async fn create_channel_filter_report(
        &self,
        name: &str,
        filter_name: &str,
        description: Option<&str>,
    ) -> Result<i64> {
        let source = Element::new("dataSource")
            .with_attr("type", "channelFilter")
            .with_child(Element::new("channelFilterName").with_text(filter_name));
        self.create_report(&report_config(name, description, source))
            .await
    }

    /// Create a report sourced from a set of channel folders.
    pub async fn create_channel_folders_report(
        &self,
        name: &str,
        folder_ids: &[i64],
        include_subfolders: bool,
        description: Option<&str>,
    ) -> Result<i64> {
        let mut source = Element::new("dataSource")
            .with_attr("type", "channelFolders")
            .with_attr("includeSubFolders", bool_str(include_subfolders));
        for id in folder_ids {
            source
                .children
                .push(Element::new("channelFolder").with_attr("id", id.to_string()));
        }
        self.create_report(&report_config(name, description, source))
            .await
    }

    /// Create a report sourced from a workpad.
    pub async fn create_workpad_report(
        &self,
        name: &str,
        workpad_id: &str,
        description: Option<&str>,
    ) -> Result<i64> {
        let source = Element::new("dataSource")
            .with_attr("type", "workpad")
            .with_child(Element::new("workpad").with_attr("id", workpad_id));
        self.create_report(&report_config(name, description, source))
            .await
    }

    pub async fn delete_reports(&self, ids: impl Into<Ids>) -> Result<()> {
        let args = ApiArgs::json().with_ids(Some(&ids.into()));
        let body = self.call_checked("reports/delete", args, None, false).await?;
        check_bulk(&body.into_mapping()?, "channelReports", "delete report")
    }

    // ----- workpads ------------------------------------------------------

    pub async fn workpads(&self, ids: Option<&Ids>) -> Result<Value> {
        let args = ApiArgs::json().with_ids(ids);
        let body = self.call_checked("workpads/list", args, None, false).await?;
        take_key(body.into_mapping()?, "workpads")
    }

    /// Contents of one workpad. `"@"` addresses the default workpad.
    pub async fn workpad(&self, id: impl Into<Ids>) -> Result<Value> {
        let id = single(id, "workpads")?;
        let args = ApiArgs::json().with_ids(Some(&id));
        let body = self.call_checked("workpads/get", args, None, false).await?;
        take_key(body.into_mapping()?, "workpad")
    }

    /// Contents of the default workpad, or `None` when no workpad is marked
    /// as the default.
    pub async fn default_workpad(&self) -> Result<Option<Value>> {
        match self.workpad("@").await {
            Ok(workpad) => Ok(Some(workpad)),
            // The server reports the missing default as an error message.
            Err(FeedctlError::Remote(message)) if message == "No workpads were selected." => {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Feed rendition of a workpad's contents.
    pub async fn workpad_feed(&self, id: impl Into<Ids>) -> Result<Element> {
        let id = single(id, "workpads")?;
        let args = ApiArgs::new().with_ids(Some(&id));
        self.call_checked("workpads/feed", args, None, false)
            .await?
            .into_tree()
    }

    /// Add an item to one or more workpads.
    pub async fn add_workpad_item(
        &self,
        workpad_ids: impl Into<Ids>,
        url: &str,
        title: Option<&str>,
        custom_fields: &[(&str, &str)],
    ) -> Result<()> {
        let mut args = ApiArgs::json().with("url", url);
        if let Some(title) = title {
            args.set("title", title);
        }
        for (key, value) in custom_fields {
            args.set(*key, *value);
        }
        args.set_ids(Some(&workpad_ids.into()));
        let body = self.call_checked("workpads/addItem", args, None, false).await?;
        check_bulk(&body.into_mapping()?, "workpads", "add item to workpad")
    }

    pub async fn create_workpad(&self, name: &str, description: Option<&str>) -> Result<i64> {
        let mut config = Element::new("workpad").with_child(Element::new("name").with_text(name));
        if let Some(description) = description {
            config
                .children
                .push(Element::new("description").with_text(description));
        }
        let config_xml = config.to_xml();
        created_id(
            self.call_checked("workpads/create", ApiArgs::json(), Some(&config_xml), false)
                .await?,
        )
    }

    pub async fn delete_workpads(&self, ids: impl Into<Ids>) -> Result<()> {
        let args = ApiArgs::json().with_ids(Some(&ids.into()));
        let body = self.call_checked("workpads/delete", args, None, false).await?;
        check_bulk(&body.into_mapping()?, "workpads", "delete workpad")
    }

    // ----- feed items and search ----------------------------------------

    pub async fn feed_items(&self, ids: Option<&Ids>) -> Result<Value> {
        let args = ApiArgs::json().with_ids(ids);
        let body = self.call_checked("feedItems/get", args, None, false).await?;
        take_key(body.into_mapping()?, "feedItems")
    }

    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<Value> {
        let mut args = ApiArgs::json()
            .with("query", query)
            .with("fidf", options.results_format.as_str())
            .with("advsyn", options.advanced_syntax)
            .with("page", options.page)
            .with("pageSize", options.page_size);
        if let Some(locations) = &options.locations {
            args.set("locations", locations.join(","));
        }
        let body = self.call_checked("search/query", args, None, false).await?;
        take_key(body.into_mapping()?, "searchResults")
    }
}

/// Per-item outcome of a bulk operation.
#[derive(Debug, Deserialize)]
struct BulkStatus {
    id: Value,
    name: String,
    status: String,
}

/// Fail on the first entry whose status isn't `"OK"`, naming the item.
fn check_bulk(body: &Value, list_key: &'static str, failure: &str) -> Result<()> {
    let entries = body
        .get(list_key)
        .cloned()
        .ok_or(FeedctlError::UnexpectedResponse(list_key))?;
    let entries: Vec<BulkStatus> = serde_json::from_value(entries)?;
    for entry in entries {
        if entry.status != "OK" {
            return Err(FeedctlError::Remote(format!(
                "Can't {failure} \"{}\" ({}): {}",
                entry.name,
                scalar_string(&entry.id),
                entry.status
            )));
        }
    }
    Ok(())
}

fn single(id: impl Into<Ids>, what: &'static str) -> Result<Ids> {
    let id = id.into();
    if id.is_many() {
        return Err(FeedctlError::MultipleIds(what));
    }
    Ok(id)
}

/// Pull the created entity's id out of a `{"status":{"id":...}}` response;
/// the server sends it sometimes as a number, sometimes as a string.
fn created_id(body: Body) -> Result<i64> {
    let value = body.into_mapping()?;
    let id = value
        .get("status")
        .and_then(|status| status.get("id"))
        .ok_or(FeedctlError::UnexpectedResponse("status.id"))?;
    match id {
        Value::Number(number) => number
            .as_i64()
            .ok_or(FeedctlError::UnexpectedResponse("status.id")),
        Value::String(text) => text
            .trim()
            .parse()
            .map_err(|_| FeedctlError::UnexpectedResponse("status.id")),
        _ => Err(FeedctlError::UnexpectedResponse("status.id")),
    }
}

/// Pull the value stored under `key` out of a JSON mapping, erroring when the
/// key is absent.
fn take_key(mut value: Value, key: &'static str) -> Result<Value> {
    match value.get_mut(key) {
        Some(inner) => Ok(inner.take()),
        None => Err(FeedctlError::UnexpectedResponse(key)),
    }
}

fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn report_config(name: &str, description: Option<&str>, data_source: Element) -> Element {
    let mut config = Element::new("channelReport").with_child(Element::new("name").with_text(name));
    if let Some(description) = description {
        config
            .children
            .push(Element::new("description").with_text(description));
    }
    config.with_child(data_source)
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}
