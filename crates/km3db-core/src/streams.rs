// Stream catalog
//
// The web API describes its data streams at `streamds`: one TSV row per
// stream with name, description, output formats, and selector lists.
// The catalog is fetched once at construction and held as an explicit
// name → descriptor map; looking up a name the server never listed is a
// hard error, while empty results and server-reported errors degrade to
// "no data".

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::de::DeserializeOwned;
use tracing::{debug, error};

use km3db_api::DbClient;

use crate::decode::{self, Container, QueryResult, Record};
use crate::error::CoreError;

/// Default output format requested from the server.
pub const DEFAULT_FORMAT: &str = "txt";

/// Metadata of one stream, parsed from the catalog listing.
///
/// The selector lists are hints for callers (and for `streamds info`);
/// the server itself enforces the mandatory ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    /// Unique (lower-cased) stream name.
    pub name: String,
    pub description: String,
    /// Output formats the server offers for this stream.
    pub formats: Vec<String>,
    /// Selectors that must be supplied; empty = none.
    pub mandatory_selectors: Vec<String>,
    /// Selectors that may be supplied; empty = none.
    pub optional_selectors: Vec<String>,
}

impl StreamDescriptor {
    fn from_record(record: &Record) -> Result<Self, CoreError> {
        let field = |name: &str| {
            record
                .get(name)
                .map(str::to_owned)
                .ok_or_else(|| CoreError::Catalog(format!("listing has no '{name}' column")))
        };
        Ok(Self {
            name: field("stream")?.to_lowercase(),
            description: field("description")?,
            formats: split_list(&field("formats")?),
            mandatory_selectors: split_list(&field("mandatory_selectors")?),
            optional_selectors: split_list(&field("optional_selectors")?),
        })
    }

    /// Documentation block: description, formats, selectors.
    pub fn help(&self) -> String {
        format!(
            "{}\n{}\n{}\n  available formats:   {}\n  mandatory selectors: {}\n  optional selectors:  {}\n",
            self.name,
            "-".repeat(self.name.len()),
            self.description,
            join_list(&self.formats),
            join_list(&self.mandatory_selectors),
            join_list(&self.optional_selectors),
        )
    }
}

/// Comma-separated catalog list; `-` means none.
fn split_list(raw: &str) -> Vec<String> {
    if raw == "-" {
        return Vec::new();
    }
    raw.split(',')
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

fn join_list(list: &[String]) -> String {
    if list.is_empty() {
        "-".to_owned()
    } else {
        list.join(",")
    }
}

/// Access to the `streamds` data streams.
///
/// Construction fetches the catalog; after that the stream set is fixed
/// for the lifetime of the instance (re-fetch by constructing a new
/// one). Enumeration is always sorted by stream name, whatever order the
/// server sent.
pub struct StreamDs {
    client: DbClient,
    streams: BTreeMap<String, StreamDescriptor>,
    default_container: Option<Container>,
}

impl StreamDs {
    /// Fetch the catalog and build the stream map.
    pub async fn new(client: DbClient) -> Result<Self, CoreError> {
        let Some(listing) = client.get("streamds").await? else {
            return Err(CoreError::Catalog("no data from the directory endpoint".into()));
        };
        let mut streams = BTreeMap::new();
        for record in decode::to_records(&listing)? {
            let descriptor = StreamDescriptor::from_record(&record)?;
            streams.insert(descriptor.name.clone(), descriptor);
        }
        debug!("stream catalog loaded with {} streams", streams.len());
        Ok(Self {
            client,
            streams,
            default_container: None,
        })
    }

    /// Fetch the catalog and apply `container` whenever a query does not
    /// pick one itself.
    pub async fn with_default_container(
        client: DbClient,
        container: Container,
    ) -> Result<Self, CoreError> {
        let mut sds = Self::new(client).await?;
        sds.default_container = Some(container);
        Ok(sds)
    }

    /// Descriptors of all known streams, sorted by name.
    pub fn streams(&self) -> impl Iterator<Item = &StreamDescriptor> {
        self.streams.values()
    }

    /// Number of streams in the catalog.
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// The catalog entry for `name`, if the server listed it.
    pub fn descriptor(&self, name: &str) -> Option<&StreamDescriptor> {
        self.streams.get(name)
    }

    /// Look up a stream operation by name.
    pub fn stream(&self, name: &str) -> Result<StreamHandle<'_>, CoreError> {
        match self.streams.get(name) {
            Some(descriptor) => Ok(StreamHandle {
                sds: self,
                descriptor,
            }),
            None => Err(CoreError::UnknownStream(name.to_owned())),
        }
    }

    /// Start building a query; the stream name is not checked against
    /// the catalog (use [`stream`](Self::stream) for that).
    pub fn query(&self, stream: &str) -> StreamQuery<'_> {
        StreamQuery {
            sds: self,
            stream: stream.to_owned(),
            fmt: DEFAULT_FORMAT.to_owned(),
            container: None,
            selectors: Vec::new(),
        }
    }

    /// Fetch stream data.
    ///
    /// Selectors go into the query string in the given order. An empty
    /// response and a server-reported error (body starting with `ERROR`)
    /// are logged and come back as `Ok(None)`.
    pub async fn get(
        &self,
        stream: &str,
        fmt: &str,
        container: Option<Container>,
        selectors: &[(&str, &str)],
    ) -> Result<Option<QueryResult>, CoreError> {
        let url = stream_url(stream, fmt, selectors);
        let Some(data) = self.fetch(&url).await? else {
            return Ok(None);
        };

        let container = container.or(self.default_container);
        Ok(Some(match container {
            None => QueryResult::Raw(data),
            Some(Container::Records) => QueryResult::Records(decode::to_records(&data)?),
            Some(Container::Table) => QueryResult::Table(decode::to_table(&data)?),
        }))
    }

    /// Fetch stream data and decode it into typed records.
    pub async fn get_typed<T: DeserializeOwned>(
        &self,
        stream: &str,
        selectors: &[(&str, &str)],
    ) -> Result<Option<Vec<T>>, CoreError> {
        let url = stream_url(stream, DEFAULT_FORMAT, selectors);
        let Some(data) = self.fetch(&url).await? else {
            return Ok(None);
        };
        Ok(Some(decode::to_typed(&data)?))
    }

    /// Human-readable documentation for every stream in the catalog.
    pub fn help(&self) -> String {
        let mut out = String::new();
        for stream in self.streams.values() {
            let _ = writeln!(out, "{}", stream.help());
        }
        out
    }

    /// Raw fetch with the no-data / server-error classification.
    async fn fetch(&self, url: &str) -> Result<Option<String>, CoreError> {
        let data = self.client.get(url).await?;
        let Some(data) = data.filter(|d| !d.is_empty()) else {
            error!("no data found at URL '{url}'");
            return Ok(None);
        };
        if data.starts_with("ERROR") {
            error!("{data}");
            return Ok(None);
        }
        Ok(Some(data))
    }
}

fn stream_url(stream: &str, fmt: &str, selectors: &[(&str, &str)]) -> String {
    let mut query = String::new();
    for (key, value) in selectors {
        let _ = write!(query, "&{key}={value}");
    }
    format!(
        "streamds/{stream}.{fmt}?{}",
        query.trim_start_matches('&')
    )
}

/// A stream operation bound to its catalog entry.
#[derive(Clone, Copy)]
pub struct StreamHandle<'a> {
    sds: &'a StreamDs,
    descriptor: &'a StreamDescriptor,
}

impl<'a> StreamHandle<'a> {
    pub fn descriptor(&self) -> &'a StreamDescriptor {
        self.descriptor
    }

    /// Start building a query against this stream.
    pub fn query(&self) -> StreamQuery<'a> {
        self.sds.query(&self.descriptor.name)
    }

    /// Fetch with the default format and container.
    pub async fn get(&self, selectors: &[(&str, &str)]) -> Result<Option<QueryResult>, CoreError> {
        self.sds
            .get(&self.descriptor.name, DEFAULT_FORMAT, None, selectors)
            .await
    }

    /// Fetch and decode into typed records.
    pub async fn get_typed<T: DeserializeOwned>(
        &self,
        selectors: &[(&str, &str)],
    ) -> Result<Option<Vec<T>>, CoreError> {
        self.sds.get_typed(&self.descriptor.name, selectors).await
    }
}

/// Query builder; selector order is preserved in the request.
pub struct StreamQuery<'a> {
    sds: &'a StreamDs,
    stream: String,
    fmt: String,
    container: Option<Container>,
    selectors: Vec<(String, String)>,
}

impl StreamQuery<'_> {
    /// Output format requested from the server (`txt`, `text`, `bin`).
    pub fn format(mut self, fmt: impl Into<String>) -> Self {
        self.fmt = fmt.into();
        self
    }

    pub fn container(mut self, container: Container) -> Self {
        self.container = Some(container);
        self
    }

    /// Add one selector; values are sent as-is.
    pub fn selector(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.selectors.push((key.into(), value.to_string()));
        self
    }

    pub async fn send(self) -> Result<Option<QueryResult>, CoreError> {
        let pairs: Vec<(&str, &str)> = self
            .selectors
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        self.sds
            .get(&self.stream, &self.fmt, self.container, &pairs)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_order_is_kept_in_the_url() {
        assert_eq!(
            stream_url("runs", "txt", &[("detid", "49"), ("minrun", "8000")]),
            "streamds/runs.txt?detid=49&minrun=8000"
        );
    }

    #[test]
    fn no_selectors_leaves_an_empty_query() {
        assert_eq!(stream_url("detectors", "txt", &[]), "streamds/detectors.txt?");
    }

    #[test]
    fn dash_lists_parse_to_empty() {
        assert_eq!(split_list("-"), Vec::<String>::new());
        assert_eq!(split_list("detid,minrun"), vec!["detid", "minrun"]);
    }
}
