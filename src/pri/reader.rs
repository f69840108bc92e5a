use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::{Arc, Mutex};

use log::{debug, info};

use super::codec::text;
use super::format::data_item::DataItemSection;
use super::format::{data_item, decision, header, resource_map, schema, section};
use super::index::ResourceMapIndex;
use super::qualifier;
use super::types::error::{PriError, Result};
use super::types::models::*;

/// The main reader for PRI resource containers.
///
/// Opening a container parses its section table and materializes the
/// primary resource map; lookups afterwards only seek and read the small
/// byte ranges holding candidate values. Data item sections are parsed on
/// first use and cached.
///
/// The reader owns a single file handle. Every seek+read pair runs under a
/// lock, so one reader can be shared between threads.
#[derive(Debug)]
pub struct PriReader {
    file: Mutex<Option<File>>,
    file_len: u64,
    container: Container,
    resource_map: SectionRef,
    schema_name: String,
    index: ResourceMapIndex,
    data_items: Mutex<HashMap<SectionRef, Arc<DataItemSection>>>,
}

impl PriReader {
    /// Open a resource container from the given path.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be opened ([`PriError::Configuration`])
    /// - The header, section table or resource map is invalid
    ///   ([`PriError::MalformedContainer`])
    /// - No primary resource map is declared ([`PriError::MissingResourceMap`])
    ///
    /// The file handle is released on every failure path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening resource container: {}", path.display());
        let mut file = File::open(path).map_err(|source| PriError::Configuration {
            path: path.to_path_buf(),
            source,
        })?;

        // Parse header, section table and descriptor
        let container = header::parse(&mut file)?;
        let file_len = container.header.total_file_size as u64;

        // Materialize the primary resource map and the sections it depends on
        let map_ref = container
            .descriptor
            .primary_resource_map
            .ok_or(PriError::MissingResourceMap)?;
        let map_entry = container.expect_section(map_ref, |k| k.is_resource_map(), "resource map")?;
        let map_body = section::read_body(&mut file, map_entry)?;
        let (schema_ref, decision_ref) = resource_map::section_refs(&map_body)?;

        let schema_entry = container.expect_section(schema_ref, |k| k.is_schema(), "hierarchical schema")?;
        let schema = schema::parse(
            &section::read_body(&mut file, schema_entry)?,
            schema_entry.kind == SectionKind::HierarchicalSchemaEx,
        )?;

        let decision_entry = container.expect_section(
            decision_ref,
            |k| k == SectionKind::DecisionInfo,
            "decision info",
        )?;
        let decisions = decision::parse(&section::read_body(&mut file, decision_entry)?)?;

        let items = resource_map::parse(
            &map_body,
            map_entry.body_span().offset,
            map_entry.kind == SectionKind::ResourceMap2,
            &schema,
            &decisions,
        )?;
        let index = ResourceMapIndex::build(items);

        info!(
            "Resource container opened: schema '{}', {} resources",
            schema.unique_name,
            index.len()
        );

        Ok(Self {
            file: Mutex::new(Some(file)),
            file_len,
            container,
            resource_map: map_ref,
            schema_name: schema.unique_name,
            index,
            data_items: Mutex::new(HashMap::new()),
        })
    }

    /// Resolve a resource name to its best text for `locale`.
    ///
    /// `name` may be written as `ms-resource:Foo/Bar`, `\Foo\Bar`, `Foo/Bar`
    /// or `Foo\Bar`. If the name is not found it is retried once under
    /// `\Resources\`.
    ///
    /// Returns `Ok(None)` when the name is not present or no candidate yields
    /// usable text. Failures reading individual candidates are not reported;
    /// the next candidate is tried instead.
    ///
    /// # Errors
    /// [`PriError::Closed`] if the reader has been closed, including by a
    /// [`close`](Self::close) on another thread while the lookup runs.
    pub fn resolve(&self, name: &str, locale: &str) -> Result<Option<String>> {
        self.ensure_open()?;

        let Some(item) = self.index.lookup(name) else {
            debug!("Resource '{}' not found", name);
            return Ok(None);
        };

        let text = qualifier::select_text(&item.candidates, locale, |candidate| {
            self.decode_candidate(candidate)
        })?;
        if text.is_none() {
            debug!("Resource '{}' has no text for locale '{}'", item.name, locale);
        }
        Ok(text)
    }

    /// The resource map item a name resolves to, after normalization and the
    /// implicit folder fallback.
    pub fn item(&self, name: &str) -> Result<Option<&ResourceMapItem>> {
        self.ensure_open()?;
        Ok(self.index.lookup(name))
    }

    /// The candidate set a name resolves to.
    pub fn candidates(&self, name: &str) -> Result<Option<&CandidateSet>> {
        Ok(self.item(name)?.map(|item| &item.candidates))
    }

    /// Reads and decodes the value of a single candidate.
    ///
    /// Returns `Ok(None)` if the value lives in a file outside the container,
    /// and an error if its bytes are out of bounds or cannot be read, or if
    /// the reader has been closed.
    pub fn read_candidate(&self, candidate: &Candidate) -> Result<Option<String>> {
        self.ensure_open()?;
        let Some(span) = self.candidate_span(candidate)? else {
            return Ok(None);
        };
        let bytes = self.read_span(span)?;
        Ok(Some(text::decode(&bytes, candidate.value_type)))
    }

    /// Release the file handle. Further lookups fail with [`PriError::Closed`].
    ///
    /// Closing twice is allowed.
    pub fn close(&self) -> Result<()> {
        let mut file = self.file.lock().map_err(|_| PriError::LockPoisoned)?;
        if file.take().is_some() {
            info!("Resource container closed");
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.file.lock().map(|file| file.is_none()).unwrap_or(true)
    }

    /// Header, section table and descriptor.
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Unique name of the schema behind the primary resource map.
    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    /// Section holding the primary resource map.
    pub fn resource_map_section(&self) -> SectionRef {
        self.resource_map
    }

    /// Number of named resources in the primary resource map.
    pub fn num_resources(&self) -> usize {
        self.index.len()
    }

    fn ensure_open(&self) -> Result<()> {
        let file = self.file.lock().map_err(|_| PriError::LockPoisoned)?;
        if file.is_none() {
            return Err(PriError::Closed);
        }
        Ok(())
    }

    /// Like [`read_candidate`](Self::read_candidate), but a candidate that
    /// cannot be read counts as having no value. Only the reader's own state
    /// (closed, poisoned) is an error.
    fn decode_candidate(&self, candidate: &Candidate) -> Result<Option<String>> {
        match self.read_candidate(candidate) {
            Ok(text) => Ok(text),
            Err(e @ (PriError::Closed | PriError::LockPoisoned)) => Err(e),
            Err(e) => {
                debug!("Skipping candidate {:?}: {}", candidate.data, e);
                Ok(None)
            }
        }
    }

    fn candidate_span(&self, candidate: &Candidate) -> Result<Option<ByteSpan>> {
        match candidate.data {
            CandidateData::Inline(span) => Ok(Some(span)),
            CandidateData::DataItem(item) => {
                let section = self.data_item_section(item.section)?;
                Ok(Some(section.item(item.index as usize)?))
            }
            CandidateData::External { source_file } => {
                debug!("Candidate value is stored in referenced file {}", source_file);
                Ok(None)
            }
        }
    }

    /// Returns a parsed data item section, parsing and caching it on first use.
    fn data_item_section(&self, section_ref: SectionRef) -> Result<Arc<DataItemSection>> {
        {
            let cache = self.data_items.lock().map_err(|_| PriError::LockPoisoned)?;
            if let Some(section) = cache.get(&section_ref) {
                return Ok(Arc::clone(section));
            }
        }

        let entry = self.container.expect_section(
            section_ref,
            |k| k == SectionKind::DataItem,
            "data item",
        )?;
        let body_span = entry.body_span();
        let body = self.read_span(body_span)?;
        let parsed = Arc::new(data_item::parse(&body, body_span.offset)?);
        debug!("Data item section {} loaded: {} items", section_ref, parsed.len());

        let mut cache = self.data_items.lock().map_err(|_| PriError::LockPoisoned)?;
        Ok(Arc::clone(cache.entry(section_ref).or_insert(parsed)))
    }

    /// Reads a byte range of the file under the file lock.
    fn read_span(&self, span: ByteSpan) -> Result<Vec<u8>> {
        match span.end() {
            Some(end) if end <= self.file_len => {}
            _ => {
                return Err(PriError::malformed(format!(
                    "Byte span [{:#x}, +{}] exceeds file of {} bytes",
                    span.offset, span.length, self.file_len
                )));
            }
        }

        let mut guard = self.file.lock().map_err(|_| PriError::LockPoisoned)?;
        let file = guard.as_mut().ok_or(PriError::Closed)?;
        file.seek(SeekFrom::Start(span.offset))?;
        let mut bytes = vec![0u8; span.length as usize];
        file.read_exact(&mut bytes)?;
        Ok(bytes)
    }
}
