//! Command dispatch: maps a parsed [`Commands`] variant onto the
//! library, and renders the result through [`crate::cli::output`].

#![allow(clippy::too_many_lines)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chunking::{chunk_turns, DEFAULT_MAX_TOKENS, DEFAULT_OVERLAP_TOKENS};
use crate::core::{SessionSource, SourceType};
use crate::episode::classify_session;
use crate::error::{CommandError, Result};
use crate::index::VectorIndex;
use crate::oracle::Oracle;
use crate::pack::format::Format as PackFormat;
use crate::retrieval::{retrieve, RetrievalFilters, RetrievalOptions, ScoredChunk};
use crate::storage::registry::Registry;
use crate::storage::{Config, Store};
use crate::transcript::extract_turns;

use super::output::{self, OutputFormat};
use super::parser::{Cli, Commands, HooksAction};

/// Embedding dimension used when no real oracle is configured. Matches
/// `nomic-embed-text`'s output size, the Ollama config's default embed
/// model.
const DEFAULT_EMBED_DIM: usize = 768;

/// Dispatches `cli.command` and renders the result as a string in
/// `cli.format`.
///
/// # Errors
///
/// Returns an error for any command failure; the caller is responsible
/// for formatting it via [`output::format_error`] and choosing an exit
/// code.
pub fn execute(cli: &Cli) -> Result<String> {
    let root = cli.get_root();
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Init { force } => cmd_init(&root, *force, format),
        Commands::Hooks { action } => cmd_hooks(action, format),
        Commands::Hook => Ok(cmd_hook(&root)),
        Commands::Import { path } => cmd_import(&root, path, format),
        Commands::Sessions => cmd_sessions(&root, format),
        Commands::Delete { id } => cmd_delete(&root, id, format),
        Commands::Run { .. } => Err(CommandError::NotImplemented(
            "run: PTY session wrapping is out of scope".to_string(),
        )
        .into()),
        Commands::Search {
            query,
            top_k,
            source_type,
            session,
            no_decay,
            global,
        } => cmd_search(
            &root,
            query,
            *top_k,
            source_type.as_deref(),
            session.as_deref(),
            !*no_decay,
            *global,
            format,
        ),
        Commands::Graph => {
            Err(CommandError::NotImplemented("graph: not implemented".to_string()).into())
        }
        Commands::Pack {
            mode,
            budget,
            pack_format,
        } => cmd_pack(&root, mode, *budget, pack_format, format),
        Commands::Migrate => cmd_migrate(&root, format),
        Commands::Reindex => cmd_reindex(&root, format),
        Commands::Projects => cmd_projects(format),
    }
}

fn open_store(root: &Path) -> Result<Store> {
    Store::open(root)
}

fn build_oracle(config: &Config) -> Box<dyn Oracle> {
    #[cfg(feature = "ollama")]
    {
        if let Ok(oracle) = crate::oracle::ollama::OllamaOracle::new(
            config.ollama.base_url.clone(),
            config.ollama.embed_model.clone(),
            config.ollama.chat_model.clone(),
            DEFAULT_EMBED_DIM,
            Some(Duration::from_secs(60)),
        ) {
            return Box::new(oracle);
        }
    }
    let _ = config;
    Box::new(crate::oracle::fake::FakeOracle::new(DEFAULT_EMBED_DIM))
}

/// Retries a fallible oracle-backed call once with a short backoff, per
/// the documented retry policy for oracle-unreachable/model-missing/
/// timeout failures at the search and reindex boundaries.
fn with_oracle_retry<T>(mut f: impl FnMut() -> Result<T>) -> Result<T> {
    match f() {
        Ok(value) => Ok(value),
        Err(crate::error::Error::Oracle(_)) => {
            std::thread::sleep(Duration::from_millis(200));
            f()
        }
        Err(e) => Err(e),
    }
}

fn cmd_init(root: &Path, force: bool, format: OutputFormat) -> Result<String> {
    if root.join("config.json").exists() && !force {
        return Err(CommandError::ExecutionFailed(format!(
            "a store already exists at {}. Pass --force to reinitialize",
            root.display()
        ))
        .into());
    }
    Store::init(root)?;
    Ok(output::format_init(root, format))
}

fn cmd_hooks(action: &HooksAction, _format: OutputFormat) -> Result<String> {
    let what = match action {
        HooksAction::Install => "install",
        HooksAction::Uninstall => "uninstall",
        HooksAction::Status => "status",
    };
    Err(CommandError::NotImplemented(format!(
        "hooks {what}: installing into the host agent's own config is out of scope"
    ))
    .into())
}

fn cmd_hook(root: &Path) -> String {
    super::hook::handle(root)
}

fn cmd_import(root: &Path, path: &Path, format: OutputFormat) -> Result<String> {
    let (session_id, chunk_count) = {
        let mut store = open_store(root)?;
        let _guard = store.write_lock()?;

        let meta = store.create_session(SessionSource::Import, Some(path.to_string_lossy().to_string()))?;
        let turns = extract_turns(path, SessionSource::Import)?;
        let chunks = chunk_turns(
            &turns,
            &meta.id,
            SourceType::Session,
            DEFAULT_MAX_TOKENS,
            DEFAULT_OVERLAP_TOKENS,
        );
        let chunk_count = chunks.len();
        store.append_chunks(&meta.id, SourceType::Session, &chunks)?;
        store.finalize_session(&meta.id, None)?;
        (meta.id, chunk_count)
    };

    register_project(root)?;
    Ok(output::format_import(&session_id, chunk_count, format))
}

fn register_project(root: &Path) -> Result<()> {
    let Some(registry_path) = crate::storage::layout::global_registry_path() else {
        return Ok(());
    };
    let mut registry = Registry::load(&registry_path)?;
    let store = open_store(root)?;
    let session_count = crate::storage::session_store::list_session_ids(store.layout())?.len();
    let absolute_root = root
        .canonicalize()
        .unwrap_or_else(|_| root.to_path_buf());
    registry.upsert(absolute_root, crate::core::now_unix(), session_count);
    registry.save(&registry_path)
}

fn cmd_sessions(root: &Path, format: OutputFormat) -> Result<String> {
    let store = open_store(root)?;
    let ids = crate::storage::session_store::list_session_ids(store.layout())?;
    let mut rows = Vec::with_capacity(ids.len());
    for id in ids {
        let meta = crate::storage::session_store::load_meta(store.layout(), &id)?;
        let chunks = crate::storage::session_store::read_chunks(store.layout(), &id)?;
        let episode = classify_session(&meta, &chunks);
        rows.push((meta, episode));
    }
    Ok(output::format_sessions(&rows, format))
}

fn cmd_delete(root: &Path, id: &str, format: OutputFormat) -> Result<String> {
    let mut store = open_store(root)?;
    let _guard = store.write_lock()?;
    crate::storage::session_store::delete_session(store.layout(), id)?;
    Ok(output::format_delete(id, format))
}

#[allow(clippy::too_many_arguments)]
fn cmd_search(
    root: &Path,
    query: &str,
    top_k: usize,
    source_type: Option<&str>,
    session: Option<&str>,
    decay_enabled: bool,
    global: bool,
    format: OutputFormat,
) -> Result<String> {
    let filters = build_filters(source_type, session)?;
    let options = RetrievalOptions {
        top_k,
        decay_enabled,
        ..RetrievalOptions::default()
    };

    let mut results = if global {
        search_global(query, &filters, &options)?
    } else {
        let store = open_store(root)?;
        search_one(&store, query, &filters, &options)?
    };

    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(top_k);
    Ok(output::format_search_results(&results, format))
}

fn build_filters(source_type: Option<&str>, session: Option<&str>) -> Result<RetrievalFilters> {
    let source_types = source_type
        .map(|s| parse_source_type(s))
        .transpose()?
        .map(|t| vec![t]);
    Ok(RetrievalFilters {
        source_types,
        session_id: session.map(ToString::to_string),
        since: None,
    })
}

fn parse_source_type(s: &str) -> Result<SourceType> {
    match s {
        "session" => Ok(SourceType::Session),
        "plan" => Ok(SourceType::Plan),
        "todo" => Ok(SourceType::Todo),
        "task" => Ok(SourceType::Task),
        other => Err(CommandError::InvalidArgument(format!("unknown source type: {other}")).into()),
    }
}

fn search_one(
    store: &Store,
    query: &str,
    filters: &RetrievalFilters,
    options: &RetrievalOptions,
) -> Result<Vec<ScoredChunk>> {
    let oracle = build_oracle(store.config());
    let index = VectorIndex::open(store.layout(), oracle.dimensions())?;
    let query_vector = with_oracle_retry(|| oracle.embed(query))?;
    retrieve(&index, query, &query_vector, filters, options, None)
}

/// Runs search against every project registered in the global registry,
/// merging scored results. Roots that fail to open are skipped; the
/// per-root failures are collected and reported as a trailing note
/// rather than aborting the whole search (the ambient logging
/// convention routes this kind of warning through the CLI layer, not
/// the library).
fn search_global(
    query: &str,
    filters: &RetrievalFilters,
    options: &RetrievalOptions,
) -> Result<Vec<ScoredChunk>> {
    let registry = Registry::load_default()?;
    let mut combined = Vec::new();
    let mut skipped: Vec<(PathBuf, crate::error::Error)> = Vec::new();

    for entry in &registry.projects {
        match open_store(&entry.root).and_then(|store| search_one(&store, query, filters, options)) {
            Ok(mut results) => combined.append(&mut results),
            Err(e) => skipped.push((entry.root.clone(), e)),
        }
    }

    for (root, e) in &skipped {
        eprintln!("search: skipping unreachable project {}: {e}", root.display());
    }

    Ok(combined)
}

fn cmd_pack(root: &Path, mode: &str, budget: usize, pack_format: &str, format: OutputFormat) -> Result<String> {
    if budget == 0 {
        return Err(CommandError::InvalidBudget("budget must be greater than zero".to_string()).into());
    }
    let render_format: PackFormat = pack_format
        .parse()
        .map_err(CommandError::InvalidArgument)?;

    let store = open_store(root)?;
    let oracle = build_oracle(store.config());
    let all_chunks = store.all_chunks()?;
    let artifact_chunks: Vec<crate::core::Chunk> = all_chunks
        .iter()
        .filter(|c| c.source_type != SourceType::Session)
        .cloned()
        .collect();

    let state = with_oracle_retry(|| {
        crate::state::ensure_fresh(store.layout(), &all_chunks, oracle.as_ref())
    })?;

    let latest_episode = latest_session_episode(&store)?;
    let resolved_mode = if mode == "auto" {
        crate::pack::infer_mode(latest_episode)
    } else {
        mode
    };

    let index = VectorIndex::open(store.layout(), oracle.dimensions())?;
    let query_vector = with_oracle_retry(|| oracle.embed(&state.summary))?;
    // Plans/todos/tasks are pulled into their own pack sections directly
    // from artifact_chunks above; restrict the similarity search to
    // session chunks so the same artifact never also shows up duplicated
    // in recent_context.
    let recent_filters = RetrievalFilters {
        source_types: Some(vec![SourceType::Session]),
        ..RetrievalFilters::default()
    };
    let retrieved = retrieve(
        &index,
        &state.summary,
        &query_vector,
        &recent_filters,
        &RetrievalOptions::default(),
        None,
    )?;

    let pack = crate::pack::assemble(&state, &artifact_chunks, &retrieved, resolved_mode, budget, store.config());
    let rendered = crate::pack::render(&pack, render_format);
    Ok(output::format_pack(&rendered, format))
}

fn latest_session_episode(store: &Store) -> Result<Option<crate::episode::Episode>> {
    let ids = crate::storage::session_store::list_session_ids(store.layout())?;
    let Some(latest_id) = ids.last() else {
        return Ok(None);
    };
    let meta = crate::storage::session_store::load_meta(store.layout(), latest_id)?;
    let chunks = crate::storage::session_store::read_chunks(store.layout(), latest_id)?;
    Ok(classify_session(&meta, &chunks))
}

fn cmd_migrate(root: &Path, format: OutputFormat) -> Result<String> {
    let mut store = open_store(root)?;
    let from_version = store.config().version;
    let mut config = store.config().clone();
    config.version = crate::storage::config::CONFIG_VERSION;
    store.set_config(config)?;
    Ok(output::format_migrate(from_version, crate::storage::config::CONFIG_VERSION, format))
}

fn cmd_reindex(root: &Path, format: OutputFormat) -> Result<String> {
    let store = open_store(root)?;
    let oracle = build_oracle(store.config());
    let chunks = store.all_chunks()?;
    let count = chunks.len();
    with_oracle_retry(|| {
        VectorIndex::rebuild(store.layout(), &chunks, oracle.as_ref())?;
        Ok(())
    })?;
    Ok(output::format_reindex(count, format))
}

fn cmd_projects(format: OutputFormat) -> Result<String> {
    let registry = Registry::load_default()?;
    Ok(output::format_projects(&registry.projects, format))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::parser::Cli;
    use clap::Parser;

    fn cli_for(args: &[&str]) -> Cli {
        let mut full = vec!["memory-bank"];
        full.extend_from_slice(args);
        Cli::parse_from(full)
    }

    #[test]
    fn init_then_sessions_reports_empty_store() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join(".memory-bank");
        let root_str = root.to_string_lossy().to_string();

        let init = execute(&cli_for(&["--root", &root_str, "init"])).unwrap();
        assert!(init.contains("initialized"));

        let sessions = execute(&cli_for(&["--root", &root_str, "sessions"])).unwrap();
        assert!(sessions.contains("no sessions"));
    }

    #[test]
    fn search_without_init_reports_not_initialized() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join(".memory-bank");
        let root_str = root.to_string_lossy().to_string();

        let err = execute(&cli_for(&["--root", &root_str, "search", "anything"])).unwrap_err();
        assert!(matches!(err, crate::error::Error::Storage(crate::error::StorageError::NotInitialized)));
    }

    #[test]
    fn run_command_is_not_implemented() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join(".memory-bank");
        let root_str = root.to_string_lossy().to_string();
        execute(&cli_for(&["--root", &root_str, "init"])).unwrap();

        let err = execute(&cli_for(&["--root", &root_str, "run", "--", "echo", "hi"])).unwrap_err();
        assert!(matches!(err, crate::error::Error::Command(crate::error::CommandError::NotImplemented(_))));
    }

    #[test]
    fn pack_with_zero_budget_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join(".memory-bank");
        let root_str = root.to_string_lossy().to_string();
        execute(&cli_for(&["--root", &root_str, "init"])).unwrap();

        let err = execute(&cli_for(&[
            "--root", &root_str, "pack", "--budget", "0",
        ]))
        .unwrap_err();
        assert!(matches!(err, crate::error::Error::Command(crate::error::CommandError::InvalidBudget(_))));
    }
}
