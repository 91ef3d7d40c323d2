//! Remote backend: a REST service speaking JSON over HTTP.
//!
//! ## Endpoints
//!
//! | Path | Use |
//! |------|-----|
//! | `/v1/tags`, `/v1/tags/{group}` | tag groups |
//! | `/v1/tags/{group}/tags[/{tag}]` | tags within a group |
//! | `/v1/pvs`, `/v1/pvs/{id}` | PVs; `DELETE` archives |
//! | `/v1/pvs/multi` | bulk PV creation |
//! | `/v1/snapshots`, `/v1/snapshots/{id}` | snapshots |
//!
//! Successful responses wrap their body as `{"payload": ...}`. Failures carry
//! the reason in `errorMessage` or `message`, surfaced verbatim as a
//! `Backend` error. Calls block and are never retried.
//!
//! ## Tag Cache
//!
//! The TagDef is needed to unpack every PV, so it is cached for a bounded
//! interval (one minute by default) and refreshed transparently afterwards.
//! Tag mutations made through this backend drop the cache immediately.
//!
//! ## Meta PVs
//!
//! The service has no meta PV endpoint; the list lives in this process.

pub mod wire;

use std::cell::RefCell;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use self::wire::{
    pack_new_pv, pack_pv, pack_snapshot, unpack_pv, unpack_snapshot, unpack_snapshot_metadata,
    WirePvIn, WireSnapshotIn, WireTagGroup, WireTagGroupSummary,
};
use super::{Backend, NewPv, PvUpdate, SnapshotFilter};
use crate::attributes::{filter_entries, wanted_kinds, SearchTerm};
use crate::error::{Result, SquirrelError};
use crate::model::{Entry, EntryKind, Pv, Snapshot};
use crate::tags::{GroupId, TagDef, TagGroup, TagId};

pub const TAGS: &str = "/v1/tags";
pub const PVS: &str = "/v1/pvs";
pub const PVS_MULTI: &str = "/v1/pvs/multi";
pub const SNAPSHOTS: &str = "/v1/snapshots";

pub const DEFAULT_TAG_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A non-2xx answer from the service.
#[derive(Debug)]
struct Rejected {
    status: u16,
    message: String,
}

impl From<Rejected> for SquirrelError {
    fn from(rejected: Rejected) -> Self {
        SquirrelError::Backend(rejected.message)
    }
}

type Outcome = std::result::Result<Value, Rejected>;

pub struct HttpBackend {
    address: String,
    agent: ureq::Agent,
    tag_ttl: Duration,
    tag_cache: RefCell<Option<(Instant, TagDef)>>,
    meta_pvs: Vec<Pv>,
}

impl HttpBackend {
    pub fn new(address: impl Into<String>) -> Self {
        Self::with_timeout(address, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(address: impl Into<String>, timeout: Duration) -> Self {
        let address: String = address.into();
        Self {
            address: address.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            tag_ttl: DEFAULT_TAG_TTL,
            tag_cache: RefCell::new(None),
            meta_pvs: Vec::new(),
        }
    }

    /// How long a fetched TagDef is reused.
    pub fn with_tag_ttl(mut self, ttl: Duration) -> Self {
        self.tag_ttl = ttl;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn invalidate_tags(&self) {
        self.tag_cache.borrow_mut().take();
    }

    // --- transport ---

    /// Send one request and split the answer into payload or rejection.
    fn exchange(
        &self,
        method: &str,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Outcome> {
        let url = format!("{}{}", self.address, path);
        let mut request = self.agent.request(method, &url);
        for (key, value) in query {
            request = request.query(key, value);
        }
        let sent = match body {
            Some(body) => request.send_json(body),
            None => request.call(),
        };
        match sent {
            Ok(response) => {
                let status = response.status();
                debug!(method, url = %url, status, "{}", response.status_text());
                Ok(Ok(payload(response)?))
            }
            Err(ureq::Error::Status(status, response)) => {
                let reason = response.status_text().to_string();
                debug!(method, url = %url, status, "{}", reason);
                let message = error_message(response).unwrap_or(reason);
                Ok(Err(Rejected { status, message }))
            }
            Err(err) => {
                debug!(method, url = %url, error = %err, "request failed");
                Err(SquirrelError::from(err))
            }
        }
    }

    fn request(
        &self,
        method: &str,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        Ok(self.exchange(method, path, query, body)??)
    }

    fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        decode(self.request("GET", path, query, None)?)
    }

    // --- tags ---

    fn fetch_tags(&self) -> Result<TagDef> {
        let groups: Vec<WireTagGroupSummary> = self.get(TAGS, &[])?;
        let mut def = TagDef::new();
        for summary in groups {
            let detail = self.request("GET", &format!("{}/{}", TAGS, summary.id), &[], None)?;
            let detail: WireTagGroup = decode(first_of(detail))?;
            let mut group = TagGroup::new(summary.name, detail.description);
            for tag in detail.tags {
                group.tags.insert(tag.id, tag.name);
            }
            def.insert(summary.id, group);
        }
        Ok(def)
    }

    fn pvs(&self) -> Result<Vec<Pv>> {
        let def = self.get_tags()?;
        let pvs: Vec<WirePvIn> = self.get(PVS, &[])?;
        pvs.into_iter().map(|pv| unpack_pv(pv, &def)).collect()
    }

    fn find_pv(&self, id: &Uuid) -> Result<Option<Pv>> {
        match self.exchange("GET", &format!("{}/{}", PVS, id), &[], None)? {
            Ok(payload) => {
                let def = self.get_tags()?;
                Ok(Some(unpack_pv(decode(first_of(payload))?, &def)?))
            }
            Err(rejected) if rejected.status == 404 => Ok(None),
            Err(rejected) => Err(rejected.into()),
        }
    }

    fn find_snapshot(&self, id: &Uuid) -> Result<Option<Snapshot>> {
        match self.exchange("GET", &format!("{}/{}", SNAPSHOTS, id), &[], None)? {
            Ok(payload) => Ok(Some(unpack_snapshot(decode(first_of(payload))?)?)),
            Err(rejected) if rejected.status == 404 => Ok(None),
            Err(rejected) => Err(rejected.into()),
        }
    }

    fn create(&self, path: &str, id: Uuid, body: &Value) -> Result<Value> {
        match self.exchange("POST", path, &[], Some(body))? {
            Ok(payload) => Ok(payload),
            Err(rejected) if rejected.status == 409 => Err(SquirrelError::EntryExists(id)),
            Err(rejected) => Err(rejected.into()),
        }
    }
}

/// The `payload` field of a success body; empty bodies yield `null`.
fn payload(response: ureq::Response) -> Result<Value> {
    let text = response.into_string().map_err(SquirrelError::Io)?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    let mut body: Value = serde_json::from_str(&text)?;
    Ok(body.get_mut("payload").map(Value::take).unwrap_or(Value::Null))
}

/// `errorMessage`, else `message`, from an error body.
fn error_message(response: ureq::Response) -> Option<String> {
    let body: Value = response.into_json().ok()?;
    ["errorMessage", "message"]
        .iter()
        .filter_map(|key| body.get(*key).and_then(Value::as_str))
        .find(|msg| !msg.is_empty())
        .map(String::from)
}

/// Single-item endpoints answer with either the item or a one-item list.
fn first_of(payload: Value) -> Value {
    match payload {
        Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
        other => other,
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    Ok(serde_json::from_value(value)?)
}

fn same_on_wire(a: &Pv, b: &Pv) -> bool {
    let (Ok(a), Ok(b)) = (
        serde_json::to_value(pack_pv(a)),
        serde_json::to_value(pack_pv(b)),
    ) else {
        return false;
    };
    a == b
}

impl Backend for HttpBackend {
    fn get_entry(&self, id: &Uuid) -> Result<Entry> {
        if let Some(pv) = self.find_pv(id)? {
            return Ok(Entry::Pv(pv));
        }
        if let Some(snapshot) = self.find_snapshot(id)? {
            return Ok(Entry::Snapshot(snapshot));
        }
        Err(SquirrelError::EntryNotFound(*id))
    }

    fn save_entry(&mut self, entry: &Entry) -> Result<()> {
        match entry {
            Entry::Pv(pv) => {
                let body = serde_json::to_value(pack_pv(pv))?;
                self.create(PVS, pv.uuid, &body)?;
            }
            Entry::Snapshot(snapshot) => {
                let body = serde_json::to_value(pack_snapshot(snapshot))?;
                self.create(SNAPSHOTS, snapshot.uuid, &body)?;
            }
        }
        Ok(())
    }

    fn update_entry(&mut self, entry: &Entry) -> Result<()> {
        match entry {
            Entry::Pv(pv) => {
                let body = serde_json::to_value(pack_pv(pv))?;
                match self.exchange("PUT", &format!("{}/{}", PVS, pv.uuid), &[], Some(&body))? {
                    Ok(_) => Ok(()),
                    Err(rejected) if rejected.status == 404 => {
                        Err(SquirrelError::EntryNotFound(pv.uuid))
                    }
                    Err(rejected) => Err(rejected.into()),
                }
            }
            Entry::Snapshot(snapshot) => Err(SquirrelError::Backend(format!(
                "Snapshot {} cannot be edited on the remote service",
                snapshot.uuid
            ))),
        }
    }

    fn delete_entry(&mut self, entry: &Entry) -> Result<()> {
        let stored = self.get_entry(&entry.uuid())?;
        let current = match (&stored, entry) {
            (Entry::Pv(stored), Entry::Pv(given)) => same_on_wire(stored, given),
            (Entry::Snapshot(stored), Entry::Snapshot(given)) => {
                stored.title == given.title && stored.description == given.description
            }
            _ => false,
        };
        if !current {
            return Err(SquirrelError::Backend(format!(
                "Entry {} differs from the stored copy; refusing to delete a stale copy",
                entry.uuid()
            )));
        }
        match entry {
            Entry::Pv(pv) => self.archive_pv(&pv.uuid),
            Entry::Snapshot(snapshot) => {
                self.request(
                    "DELETE",
                    &format!("{}/{}", SNAPSHOTS, snapshot.uuid),
                    &[("deleteData", "false".to_string())],
                    None,
                )?;
                Ok(())
            }
        }
    }

    fn search(&self, terms: &[SearchTerm]) -> Result<Vec<Entry>> {
        let wanted = wanted_kinds(terms)?;
        let mut entries = Vec::new();
        if wanted.contains(&EntryKind::Pv) {
            entries.extend(self.pvs()?.into_iter().map(Entry::Pv));
        }
        if wanted.contains(&EntryKind::Snapshot) {
            entries.extend(
                self.get_snapshots(&SnapshotFilter::default())?
                    .into_iter()
                    .map(Entry::Snapshot),
            );
        }
        filter_entries(&entries, terms)
    }

    fn get_tags(&self) -> Result<TagDef> {
        if let Some((fetched, def)) = self.tag_cache.borrow().as_ref() {
            if fetched.elapsed() < self.tag_ttl {
                return Ok(def.clone());
            }
        }
        let def = self.fetch_tags()?;
        *self.tag_cache.borrow_mut() = Some((Instant::now(), def.clone()));
        Ok(def)
    }

    fn set_tags(&mut self, tags: &TagDef) -> Result<()> {
        self.invalidate_tags();
        let current = self.get_tags()?;

        for (id, _) in current.iter() {
            if !tags.contains_group(*id) {
                self.delete_tag_group(*id)?;
            }
        }
        for (id, wanted) in tags.iter() {
            let Some(existing) = current.get(*id) else {
                let new_id = self.add_tag_group(&wanted.name, &wanted.description)?;
                for name in wanted.tags.values() {
                    self.add_tag_to_group(new_id, name)?;
                }
                continue;
            };
            let name = (existing.name != wanted.name).then_some(wanted.name.as_str());
            let description =
                (existing.description != wanted.description).then_some(wanted.description.as_str());
            if name.is_some() || description.is_some() {
                self.update_tag_group(*id, name, description)?;
            }
            for (tag, tag_name) in &existing.tags {
                match wanted.tags.get(tag) {
                    None => self.delete_tag_from_group(*id, *tag)?,
                    Some(new_name) if new_name != tag_name => {
                        self.update_tag_in_group(*id, *tag, Some(new_name))?
                    }
                    Some(_) => {}
                }
            }
            for (tag, tag_name) in &wanted.tags {
                if !existing.tags.contains_key(tag) {
                    self.add_tag_to_group(*id, tag_name)?;
                }
            }
        }
        self.invalidate_tags();
        Ok(())
    }

    fn add_tag_group(&mut self, name: &str, description: &str) -> Result<GroupId> {
        let body = json!({ "name": name, "description": description });
        let payload = self.request("POST", TAGS, &[], Some(&body))?;
        self.invalidate_tags();
        first_of(payload)
            .get("id")
            .and_then(Value::as_u64)
            .and_then(|id| GroupId::try_from(id).ok())
            .ok_or_else(|| SquirrelError::Backend("service did not return a tag group id".into()))
    }

    fn update_tag_group(
        &mut self,
        group: GroupId,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<()> {
        let mut body = serde_json::Map::new();
        if let Some(name) = name {
            body.insert("name".into(), json!(name));
        }
        if let Some(description) = description {
            body.insert("description".into(), json!(description));
        }
        self.request(
            "PUT",
            &format!("{}/{}", TAGS, group),
            &[],
            Some(&Value::Object(body)),
        )?;
        self.invalidate_tags();
        Ok(())
    }

    fn delete_tag_group(&mut self, group: GroupId) -> Result<()> {
        self.request(
            "DELETE",
            &format!("{}/{}", TAGS, group),
            &[("force", "true".to_string())],
            None,
        )?;
        self.invalidate_tags();
        Ok(())
    }

    fn add_tag_to_group(&mut self, group: GroupId, name: &str) -> Result<TagId> {
        let body = json!({ "name": name, "description": "" });
        self.request(
            "PUT",
            &format!("{}/{}/tags", TAGS, group),
            &[("groupId", group.to_string())],
            Some(&body),
        )?;
        self.invalidate_tags();
        let def = self.get_tags()?;
        def.get(group)
            .and_then(|g| g.tag_id(name))
            .ok_or_else(|| {
                SquirrelError::Backend(format!("service did not report new tag '{}'", name))
            })
    }

    fn update_tag_in_group(
        &mut self,
        group: GroupId,
        tag: TagId,
        name: Option<&str>,
    ) -> Result<()> {
        let Some(name) = name else {
            let def = self.get_tags()?;
            let existing = def.get(group).ok_or(SquirrelError::UnknownTagGroup(group))?;
            if !existing.tags.contains_key(&tag) {
                return Err(SquirrelError::UnknownTag { group, tag });
            }
            return Ok(());
        };
        let body = json!({ "name": name });
        self.request(
            "PUT",
            &format!("{}/{}/tags/{}", TAGS, group, tag),
            &[("groupId", group.to_string()), ("tagId", tag.to_string())],
            Some(&body),
        )?;
        self.invalidate_tags();
        Ok(())
    }

    fn delete_tag_from_group(&mut self, group: GroupId, tag: TagId) -> Result<()> {
        self.request("DELETE", &format!("{}/{}/tags/{}", TAGS, group, tag), &[], None)?;
        self.invalidate_tags();
        Ok(())
    }

    fn get_meta_pvs(&self) -> Result<Vec<Pv>> {
        Ok(self.meta_pvs.clone())
    }

    fn set_meta_pvs(&mut self, pvs: &[Pv]) -> Result<()> {
        self.meta_pvs = pvs.to_vec();
        Ok(())
    }

    fn add_pv(&mut self, pv: NewPv) -> Result<Pv> {
        let body = serde_json::to_value(pack_new_pv(&pv))?;
        let payload = self.request("POST", PVS, &[], Some(&body))?;
        let def = self.get_tags()?;
        unpack_pv(decode(first_of(payload))?, &def)
    }

    fn add_multiple_pvs(&mut self, pvs: Vec<NewPv>) -> Result<Vec<Pv>> {
        let body: Vec<_> = pvs.iter().map(pack_new_pv).collect();
        let body = serde_json::to_value(body)?;
        let payload = self.request("POST", PVS_MULTI, &[], Some(&body))?;
        let def = self.get_tags()?;
        let created: Vec<WirePvIn> = decode(payload)?;
        created.into_iter().map(|pv| unpack_pv(pv, &def)).collect()
    }

    fn update_pv(&mut self, id: &Uuid, update: &PvUpdate) -> Result<Pv> {
        let mut body = serde_json::Map::new();
        if let Some(setpoint) = &update.setpoint {
            body.insert("setpointAddress".into(), json!(setpoint));
        }
        if let Some(readback) = &update.readback {
            body.insert("readbackAddress".into(), json!(readback));
        }
        if let Some(description) = &update.description {
            body.insert("description".into(), json!(description));
        }
        if let Some(device) = &update.device {
            body.insert("device".into(), json!(device));
        }
        if let Some(tags) = &update.tags {
            body.insert("tags".into(), json!(wire::pack_tags(tags)));
        }
        if let Some(abs) = update.abs_tolerance {
            body.insert("absTolerance".into(), json!(abs));
        }
        if let Some(rel) = update.rel_tolerance {
            body.insert("relTolerance".into(), json!(rel));
        }
        body.insert("readOnly".into(), json!(false));

        let path = format!("{}/{}", PVS, id);
        match self.exchange("PUT", &path, &[], Some(&Value::Object(body)))? {
            Ok(_) => {}
            Err(rejected) if rejected.status == 404 => {
                return Err(SquirrelError::EntryNotFound(*id))
            }
            Err(rejected) => return Err(rejected.into()),
        }
        self.find_pv(id)?.ok_or(SquirrelError::EntryNotFound(*id))
    }

    fn archive_pv(&mut self, id: &Uuid) -> Result<()> {
        match self.exchange("DELETE", &format!("{}/{}", PVS, id), &[], None)? {
            Ok(_) => Ok(()),
            Err(rejected) if rejected.status == 404 => Err(SquirrelError::EntryNotFound(*id)),
            Err(rejected) => Err(rejected.into()),
        }
    }

    fn get_all_pvs(&self) -> Result<Vec<Pv>> {
        self.pvs()
    }

    fn add_snapshot(&mut self, snapshot: &Snapshot) -> Result<()> {
        self.save_entry(&Entry::Snapshot(snapshot.clone()))
    }

    fn get_snapshots(&self, filter: &SnapshotFilter) -> Result<Vec<Snapshot>> {
        if let Some(id) = filter.uuid {
            return Ok(self.find_snapshot(&id)?.into_iter().collect());
        }
        let title = filter.title.clone().unwrap_or_default();
        let rows: Vec<WireSnapshotIn> = self.get(SNAPSHOTS, &[("title", title)])?;
        let snapshots = rows
            .into_iter()
            .map(unpack_snapshot_metadata)
            .collect::<Result<Vec<_>>>()?;
        Ok(snapshots.into_iter().filter(|s| filter.matches(s)).collect())
    }
}
