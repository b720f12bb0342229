use clap::Parser;
use tracing_subscriber::EnvFilter;

use treedex::{
    ConfigDb,
    ContentFile,
    ContentIndex,
    DataDir,
    IndexCriteria,
    Indexer,
    MemorySource,
    cli::{
        Cli,
        Command,
        CriteriaAction,
        ProtectAction,
        SearchArgs,
    },
    error::{self, Error},
    searcher::{ContentSearcher, NodeQuery},
};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("TREEDEX_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let config_db = ConfigDb::open(&data_dir.config_db())?;

    match cli.command {
        Command::Rebuild(args) => {
            let criteria = stored_criteria(&config_db)?;
            let source = load_source(&config_db, &args.content)?;
            let index =
                ContentIndex::open(&data_dir.index_dir()?, &criteria)?;
            let mut indexer = Indexer::new(index, source, criteria)?;

            let count = match args.node_type {
                Some(ref node_type) => indexer.index_all(node_type)?,
                None => indexer.rebuild()?,
            };
            eprintln!("Indexed {count} document(s).");
        }
        Command::Reindex(args) => {
            let criteria = stored_criteria(&config_db)?;
            let source = load_source(&config_db, &args.content)?;
            let node = source
                .get(args.id)
                .ok_or_else(|| Error::NotFound {
                    kind: "node",
                    name: args.id.to_string(),
                })?
                .clone();
            let index =
                ContentIndex::open(&data_dir.index_dir()?, &criteria)?;
            let mut indexer = Indexer::new(index, source, criteria)?;

            let node_type = node.node_type.clone();
            if indexer.reindex_node(&node, &node_type)? {
                eprintln!("Re-indexed node {}.", node.id);
            } else {
                eprintln!(
                    "Node {} no longer qualifies; removed from the index.",
                    node.id
                );
            }
        }
        Command::Delete(args) => {
            // Cascade deletes work from the paths stored on the index's
            // own documents, so no content export is needed.
            let criteria = stored_criteria(&config_db)?;
            let index =
                ContentIndex::open(&data_dir.index_dir()?, &criteria)?;
            let mut indexer =
                Indexer::new(index, MemorySource::new(), criteria)?;

            indexer.delete_from_index(args.id)?;
            eprintln!("Deleted node {} and its descendants.", args.id);
        }
        Command::Search(args) => {
            let criteria = stored_criteria(&config_db)?;
            let index =
                ContentIndex::open(&data_dir.index_dir()?, &criteria)?;
            let searcher = ContentSearcher::new(index)?;
            cmd_search(&searcher, &args)?;
        }
        Command::Criteria { action } => match action {
            CriteriaAction::Show { json } => {
                criteria_show(&config_db, json)?;
            }
            CriteriaAction::Set { file } => {
                let json = std::fs::read_to_string(&file)?;
                let criteria: IndexCriteria = serde_json::from_str(&json)?;
                config_db.set_criteria(&criteria)?;
                eprintln!("Criteria updated. Rebuild to apply.");
            }
            CriteriaAction::Scope { parent_id } => {
                let rescoped =
                    stored_criteria(&config_db)?.with_parent_id(parent_id);
                config_db.set_criteria(&rescoped)?;
                match parent_id {
                    Some(id) => eprintln!("Scope set to parent {id}."),
                    None => eprintln!("Scope cleared."),
                }
            }
        },
        Command::Protect { action } => match action {
            ProtectAction::Add { id } => {
                config_db.add_protected(id)?;
                eprintln!("Node {id} is now protected.");
            }
            ProtectAction::Remove { id } => {
                if !config_db.remove_protected(id)? {
                    return Err(Error::NotFound {
                        kind: "protected node",
                        name: id.to_string(),
                    });
                }
                eprintln!("Node {id} is no longer protected.");
            }
            ProtectAction::List { json } => {
                let ids = config_db.protected_ids()?;
                if json {
                    println!("{}", serde_json::to_string(&ids)?);
                } else if ids.is_empty() {
                    println!("No protected nodes.");
                } else {
                    for id in ids {
                        println!("{id}");
                    }
                }
            }
        },
        Command::Status(args) => {
            cmd_status(&config_db, &data_dir, args.json)?;
        }
        Command::Completions(args) => {
            args.generate();
        }
    }

    Ok(())
}

/// The stored criteria, or the empty default when none have been set.
fn stored_criteria(config_db: &ConfigDb) -> error::Result<IndexCriteria> {
    Ok(config_db.criteria()?.unwrap_or_default())
}

/// Load a content export and fold in the operator-managed protected
/// overrides.
fn load_source(
    config_db: &ConfigDb,
    path: &std::path::Path,
) -> error::Result<ContentFile> {
    let mut source = ContentFile::load(path)?;
    for id in config_db.protected_ids()? {
        source.protect(id);
    }
    Ok(source)
}

fn cmd_search(
    searcher: &ContentSearcher,
    args: &SearchArgs,
) -> error::Result<()> {
    let query = NodeQuery {
        text: args.query.clone(),
        node_type: args.node_type.clone(),
        node_id: args.id,
        limit: args.count,
    };
    let matches = searcher.search(&query)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&matches)?);
        return Ok(());
    }

    if matches.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    for (i, m) in matches.iter().enumerate() {
        println!(
            "{:>3}. [{:.3}] #{} {} {}",
            i + 1,
            m.score,
            m.node_id,
            m.node_type,
            m.path
        );
    }
    println!("\n{} result(s)", matches.len());
    Ok(())
}

fn criteria_show(config_db: &ConfigDb, json: bool) -> error::Result<()> {
    let criteria = stored_criteria(config_db)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&criteria)?);
        return Ok(());
    }

    match criteria.parent_id {
        Some(id) => println!("Scope: subtree of {id}"),
        None => println!("Scope: entire tree"),
    }
    print_set("Standard fields", &criteria.standard_fields);
    print_set("User fields", &criteria.user_fields);
    print_set("Include node types", &criteria.include_node_types);
    print_set("Exclude node types", &criteria.exclude_node_types);
    Ok(())
}

fn print_set(label: &str, set: &std::collections::BTreeSet<String>) {
    if set.is_empty() {
        println!("{label}: (none)");
    } else {
        let items: Vec<&str> = set.iter().map(String::as_str).collect();
        println!("{label}: {}", items.join(", "));
    }
}

fn cmd_status(
    config_db: &ConfigDb,
    data_dir: &DataDir,
    json: bool,
) -> error::Result<()> {
    let criteria = stored_criteria(config_db)?;
    let index = ContentIndex::open(&data_dir.index_dir()?, &criteria)?;
    let searcher = ContentSearcher::new(index)?;
    let documents = searcher.num_docs()?;
    let protected = config_db.protected_ids()?.len();

    if json {
        println!(
            "{{\"data_dir\":\"{}\",\"documents\":{documents},\"protected\":{protected}}}",
            data_dir.root().display()
        );
    } else {
        println!("Data directory: {}", data_dir.root().display());
        println!("Documents: {documents}");
        println!("Protected nodes: {protected}");
        match criteria.parent_id {
            Some(id) => println!("Scope: subtree of {id}"),
            None => println!("Scope: entire tree"),
        }
    }
    Ok(())
}
