//! Purpose: Hold top-level CLI command dispatch for `keyscope`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Every mutating command reloads and prints records, even when the mutation failed.
//! Invariants: A failed mutation exits with the code of the error kind behind its outcome.

use super::*;

use keyscope::api::{
    ConnectOptions, Connector, Database, Engine, ExecutionOutcome, Executor, KeySelection, KeyTree,
    LoadResult, MemoryConnector, MemoryStore, MutationInput, Query, RespConnector,
    ServerConfiguration,
};

pub(super) fn dispatch_command(cli: Cli) -> Result<RunOutcome, Error> {
    let Cli {
        url,
        db,
        memory,
        seed,
        connect_timeout,
        io_timeout,
        command,
        ..
    } = cli;

    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "keyscope", &mut io::stdout());
            return Ok(RunOutcome::ok());
        }
        Command::Version => {
            emit_version_output();
            return Ok(RunOutcome::ok());
        }
        _ => {}
    }

    let server = ServerConfiguration::new(url);
    let database = Database::new(db);
    if memory {
        let store = MemoryStore::new();
        if let Some(path) = seed {
            let index = database.index()?;
            seed::load_seed_file(&store, index as usize, &path)?;
        }
        run_command(&Engine::new(MemoryConnector::new(store)), &server, &database, command)
    } else {
        let options = ConnectOptions {
            connect_timeout: parse_duration(&connect_timeout)?,
            io_timeout: Some(parse_duration(&io_timeout)?),
        };
        run_command(&Engine::new(RespConnector::new(options)), &server, &database, command)
    }
}

fn run_command<C: Connector>(
    engine: &Engine<C>,
    server: &ServerConfiguration,
    database: &Database,
    command: Command,
) -> Result<RunOutcome, Error> {
    match command {
        Command::Scan { pattern, group } => {
            let result = engine
                .load_records(server, database, &Query::new(pattern))?
                .sorted();
            match group {
                Some(separator) => {
                    let tree = KeyTree::build(&result, &separator);
                    emit_json(json!({
                        "tree": tree,
                        "skipped": result.skipped(),
                    }));
                }
                None => emit_json(json!(result)),
            }
            Ok(RunOutcome::ok())
        }
        Command::Add {
            key,
            key_type,
            value,
            pattern,
        } => {
            let executor = Executor::add(MutationInput::new(key.clone(), key_type.into(), value));
            let (result, outcome) =
                engine.load_records_with(server, database, &Query::new(pattern), &executor)?;
            Ok(finish_mutation("add", server, database, vec![key], result, outcome))
        }
        Command::Rm { keys, pattern } => {
            let query = Query::new(pattern);
            let loaded = engine.load_records(server, database, &query)?;
            let selection = KeySelection::from_keys(&loaded, &keys)?;
            let (result, outcome) = engine.load_records_with(
                server,
                database,
                &query,
                &selection.into_executor(),
            )?;
            Ok(finish_mutation("rm", server, database, keys, result, outcome))
        }
        Command::Databases => {
            let databases = engine.list_databases(server)?;
            emit_json(json!({ "databases": databases }));
            Ok(RunOutcome::ok())
        }
        Command::Completion { .. } | Command::Version => Ok(RunOutcome::ok()),
    }
}

fn finish_mutation(
    cmd: &str,
    server: &ServerConfiguration,
    database: &Database,
    keys: Vec<String>,
    result: LoadResult,
    outcome: ExecutionOutcome,
) -> RunOutcome {
    let result = result.sorted();
    emit_json(json!({
        "outcome": outcome,
        "records": result.records(),
        "skipped": result.skipped(),
    }));
    if !outcome.failed {
        return RunOutcome::ok();
    }

    let exit_code = to_exit_code(outcome.error_kind().unwrap_or(ErrorKind::Internal));
    let mut details = Map::new();
    details.insert("keys".to_string(), json!(keys));
    details.insert("exit_code".to_string(), json!(exit_code));
    emit_notice(&Notice {
        kind: "mutation_failed".to_string(),
        time: notice_time_now().unwrap_or_default(),
        cmd: cmd.to_string(),
        server: server.url.clone(),
        database: database.to_string(),
        message: outcome.error_trace.clone(),
        details,
    });
    RunOutcome::with_code(exit_code)
}
