//! One handler per subcommand.
//!
//! Handlers are generic over the backend and control layer, so they run
//! unchanged against the configured `AnyBackend` and against an in-memory
//! store in tests. Each returns the text to print.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use squirrelapp::api::Client;
use squirrelapp::attributes::{AttrValue, AttributeKind};
use squirrelapp::commands::search::QueryTerm;
use squirrelapp::commands::CmdMessage;
use squirrelapp::control::ControlLayer;
use squirrelapp::model::{Entry, Snapshot};
use squirrelapp::store::{Backend, NewPv, PvUpdate, SnapshotFilter};
use squirrelapp::tags::TagSet;
use uuid::Uuid;

use super::render;
use super::setup::{Commands, OutputMode, TagCommands};

pub fn dispatch<B: Backend, C: ControlLayer>(
    client: &mut Client<B, C>,
    command: Commands,
    mode: OutputMode,
) -> Result<String> {
    match command {
        Commands::Pvs => list_pvs(client, mode),
        Commands::Search { terms } => search(client, &terms, mode),
        Commands::Show { id } => show(client, id, mode),
        Commands::AddPv {
            setpoint,
            readback,
            config_address,
            description,
            device,
            tags,
            abs_tolerance,
            rel_tolerance,
        } => {
            let mut pv = NewPv::new(setpoint.as_deref(), readback.as_deref(), &description);
            pv.config = config_address;
            pv.device = device;
            pv.abs_tolerance = abs_tolerance;
            pv.rel_tolerance = rel_tolerance;
            if let Some(tags) = tags {
                pv.tags = parse_tags(&tags)?;
            }
            let pv = client.add_pv(pv)?;
            done(mode, &pv, format!("Added PV {} ({})", pv.name(), pv.uuid))
        }
        Commands::EditPv {
            id,
            description,
            device,
            tags,
            abs_tolerance,
            rel_tolerance,
        } => {
            let update = PvUpdate {
                description,
                device,
                tags: tags.as_deref().map(parse_tags).transpose()?,
                abs_tolerance,
                rel_tolerance,
                ..PvUpdate::default()
            };
            let pv = client.update_pv(&id, &update)?;
            done(mode, &pv, format!("Updated PV {}", pv.name()))
        }
        Commands::Archive { id } => {
            client.archive_pv(&id)?;
            done(mode, &id, format!("Archived PV {}", id))
        }
        Commands::Delete { id } => {
            let entry = client.get(&id)?;
            client.delete(&entry)?;
            done(mode, &id, format!("Deleted {} {}", entry.kind(), id))
        }
        Commands::Import { path } => {
            let report = client
                .import_csv(&path)
                .with_context(|| format!("importing {}", path.display()))?;
            match mode {
                OutputMode::Json => json(&serde_json::json!({
                    "imported": report.imported,
                    "messages": report.messages,
                    "summary": report.validation_summary(),
                })),
                OutputMode::Term => Ok(render::import_report(&report)),
            }
        }
        Commands::Snapshots { title } => {
            let filter = SnapshotFilter {
                title,
                ..SnapshotFilter::default()
            };
            let snapshots = client.snapshots(&filter)?;
            match mode {
                OutputMode::Json => json(&snapshots),
                OutputMode::Term => Ok(render::snapshot_list(&snapshots)),
            }
        }
        Commands::Snap {
            title,
            description,
            dry_run,
        } => {
            let snapshot = client.snap(Some(Snapshot::new(title, description)))?;
            if !dry_run {
                client.save(&Entry::Snapshot(snapshot.clone()))?;
            }
            match mode {
                OutputMode::Json => json(&snapshot),
                OutputMode::Term => {
                    let mut out = render::snapshot_detail(&snapshot);
                    if !dry_run {
                        out.push_str(&render::messages(&[CmdMessage::success(format!(
                            "Saved snapshot {}",
                            snapshot.uuid
                        ))]));
                    }
                    Ok(out)
                }
            }
        }
        Commands::Apply { id, sequential } => {
            let entry = match client.get(&id)? {
                Entry::Snapshot(_) => Entry::Snapshot(client.snapshot(&id)?),
                pv => pv,
            };
            let outcome = client.apply(&entry, sequential)?;
            let out = match mode {
                OutputMode::Json => json(&serde_json::json!({
                    "ok": outcome.is_ok(),
                    "writes": outcome.writes(),
                }))?,
                OutputMode::Term => render::apply_outcome(&outcome),
            };
            if !outcome.is_ok() {
                bail!("apply did not complete\n{}", out.trim_end());
            }
            Ok(out)
        }
        Commands::Diff { main, other, all } => {
            let rows = client.compare(&main, &other)?;
            match mode {
                OutputMode::Json => {
                    let rows: Vec<_> = rows
                        .iter()
                        .map(|row| {
                            serde_json::json!({
                                "address": row.address,
                                "main": row.main.as_ref().map(|pv| &pv.setpoint_data),
                                "other": row.other.as_ref().map(|pv| &pv.setpoint_data),
                                "setpoint_match": row.setpoint_match,
                                "readback_match": row.readback_match,
                            })
                        })
                        .collect();
                    json(&rows)
                }
                OutputMode::Term => Ok(render::comparison(&rows, all)),
            }
        }
        Commands::Tags { action } => tags(client, action.unwrap_or(TagCommands::List), mode),
    }
}

fn json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(format!("{}\n", serde_json::to_string_pretty(value)?))
}

/// The changed item in JSON mode, a one-line message otherwise.
fn done<T: Serialize + ?Sized>(mode: OutputMode, value: &T, message: String) -> Result<String> {
    match mode {
        OutputMode::Json => json(value),
        OutputMode::Term => Ok(render::messages(&[CmdMessage::success(message)])),
    }
}

fn parse_tags(text: &str) -> Result<TagSet> {
    match AttributeKind::TagSet.parse(text)? {
        AttrValue::Tags(tags) => Ok(tags),
        other => bail!("expected tags, got {:?}", other),
    }
}

fn list_pvs<B: Backend, C: ControlLayer>(
    client: &Client<B, C>,
    mode: OutputMode,
) -> Result<String> {
    let pvs = client.pvs()?;
    match mode {
        OutputMode::Json => json(&pvs),
        OutputMode::Term => Ok(render::pv_table(&pvs, &client.tags()?)),
    }
}

fn search<B: Backend, C: ControlLayer>(
    client: &Client<B, C>,
    words: &[String],
    mode: OutputMode,
) -> Result<String> {
    if words.len() % 3 != 0 {
        bail!(
            "search terms come in ATTR OP VALUE triples, got {} words",
            words.len()
        );
    }
    let terms = words
        .chunks(3)
        .map(|t| QueryTerm::parse(&t[0], &t[1], &t[2]))
        .collect::<squirrelapp::error::Result<Vec<_>>>()?;
    let found = client.search(&terms)?;
    match mode {
        OutputMode::Json => json(&found),
        OutputMode::Term => Ok(render::entries(&found, &client.tags()?)),
    }
}

fn show<B: Backend, C: ControlLayer>(
    client: &Client<B, C>,
    id: Uuid,
    mode: OutputMode,
) -> Result<String> {
    let entry = match client.get(&id)? {
        // listings may omit the captured values
        Entry::Snapshot(_) => Entry::Snapshot(client.snapshot(&id)?),
        pv => pv,
    };
    match (mode, &entry) {
        (OutputMode::Json, entry) => json(entry),
        (OutputMode::Term, Entry::Pv(pv)) => Ok(render::pv_detail(pv, &client.tags()?)),
        (OutputMode::Term, Entry::Snapshot(snapshot)) => Ok(render::snapshot_detail(snapshot)),
    }
}

fn tags<B: Backend, C: ControlLayer>(
    client: &mut Client<B, C>,
    action: TagCommands,
    mode: OutputMode,
) -> Result<String> {
    let message = match action {
        TagCommands::List => {
            let def = client.tags()?;
            return match mode {
                OutputMode::Json => json(&def),
                OutputMode::Term => Ok(render::tag_def(&def)),
            };
        }
        TagCommands::AddGroup { name, description } => {
            let id = client.add_tag_group(&name, &description)?;
            format!("Added tag group {} ({})", name, id)
        }
        TagCommands::EditGroup {
            group,
            name,
            description,
        } => {
            if name.is_none() && description.is_none() {
                bail!("nothing to change: pass --name or --description");
            }
            client.update_tag_group(group, name.as_deref(), description.as_deref())?;
            format!("Updated tag group {}", group)
        }
        TagCommands::DeleteGroup { group } => {
            client.delete_tag_group(group)?;
            format!("Deleted tag group {}", group)
        }
        TagCommands::AddTag { group, name } => {
            let id = client.add_tag_to_group(group, &name)?;
            format!("Added tag {} ({}) to group {}", name, id, group)
        }
        TagCommands::RenameTag { group, tag, name } => {
            client.update_tag_in_group(group, tag, Some(&name))?;
            format!("Renamed tag {} in group {} to {}", tag, group, name)
        }
        TagCommands::DeleteTag { group, tag } => {
            client.delete_tag_from_group(group, tag)?;
            format!("Deleted tag {} from group {}", tag, group)
        }
    };
    match mode {
        OutputMode::Json => json(&client.tags()?),
        OutputMode::Term => Ok(render::messages(&[CmdMessage::success(message)])),
    }
}
