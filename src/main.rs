//! sonority: check a patch document and print the instance store it builds.
//!
//! Diagnostics go first, one per line, then the components of every scope,
//! the variables in declaration order, and the actions each trigger produces.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};

use sonority::config::Config;
use sonority::dsl::store::ComponentTable;
use sonority::dsl::{AttributeValue, InstanceStore, Interpreter, ParseOptions, Scope, TriggerKey};
use sonority::schema::SchemaCatalog;

#[derive(Parser, Debug)]
#[command(
    name = "sonority",
    version,
    about = "Check a patch document and print the components, variables, and actions it defines"
)]
struct Cli {
    /// Document to parse
    file: PathBuf,

    /// Schema catalog YAML to use instead of the built-in one
    #[arg(long, value_name = "PATH")]
    catalog: Option<PathBuf>,

    /// Reject the old single-line modulation form instead of rewriting it
    #[arg(long)]
    strict: bool,

    /// Only print actions for these trigger scopes (`master`, `note_c4`, `key_f`)
    #[arg(long = "scope", value_name = "KEY")]
    scopes: Vec<String>,

    /// Log more (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = Config::load().unwrap_or_default();
    init_logging(&cli, &config);

    let catalog = match cli.catalog.as_ref().or(config.catalog.as_ref()) {
        Some(path) => match SchemaCatalog::load(path) {
            Ok(catalog) => catalog,
            Err(e) => {
                eprintln!("{}: {e}", path.display());
                return ExitCode::from(2);
            }
        },
        None => SchemaCatalog::builtin(),
    };

    let source = match std::fs::read_to_string(&cli.file) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("failed to read {}: {e}", cli.file.display());
            return ExitCode::from(2);
        }
    };

    let options = ParseOptions {
        strict: cli.strict || config.strict,
    };
    let doc = Interpreter::new(&catalog)
        .with_options(options)
        .parse(&source);

    for diagnostic in doc.result.diagnostics() {
        println!("{}: {diagnostic}", cli.file.display());
    }
    print_components(&doc.store);
    print_variables(&doc.store);
    print_actions(&doc.store, &cli.scopes);

    if doc.result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

fn init_logging(cli: &Cli, config: &Config) {
    let level = if cli.quiet {
        LevelFilter::Error
    } else {
        match cli.verbose {
            0 => config.level_filter(),
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };
    let log_config = ConfigBuilder::new()
        .add_filter_allow_str("sonority")
        .build();
    if let Err(e) = TermLogger::init(level, log_config, TerminalMode::Stderr, ColorChoice::Auto) {
        eprintln!("logging disabled: {e}");
    }
}

fn print_components(store: &InstanceStore) {
    println!("\n[global]");
    print_table(&store.get_all_components_in_scope(&Scope::Global));

    for trigger in store.triggers() {
        println!("\n[{}]", trigger.key());
        for (name, attr) in trigger.attributes() {
            println!("  {}", describe_attribute(name, &attr));
        }
        for (name, value) in trigger.overrides() {
            println!("  variable {name} = {value} (override)");
        }
        print_table(trigger.components());
    }
}

fn print_table(table: &ComponentTable) {
    for component in table.values().flat_map(|bucket| bucket.values()) {
        println!("  {} {}", component.kind, component.name);
        for (name, attr) in component.attributes() {
            println!("    {}", describe_attribute(name, &attr));
        }
    }
}

fn describe_attribute(name: &str, attr: &AttributeValue) -> String {
    let line = match &attr.value {
        Some(value) => format!("{name} = {value}"),
        None => name.to_string(),
    };
    match &attr.modulation {
        Some(modulation) => format!("{line} ~ {modulation}"),
        None => line,
    }
}

fn print_variables(store: &InstanceStore) {
    let variables = store.variables();
    if variables.is_empty() {
        return;
    }
    println!("\nvariables:");
    for var in variables {
        let range = match (var.min, var.max) {
            (Some(min), Some(max)) => format!(" [{min}, {max}]"),
            _ => String::new(),
        };
        println!("  {} = {}{range} ({})", var.name, var.value, var.scope);
    }
}

fn print_actions(store: &InstanceStore, scopes: &[String]) {
    let keys: Vec<TriggerKey> = if scopes.is_empty() {
        store.triggers().map(|t| t.key().clone()).collect()
    } else {
        scopes
            .iter()
            .filter_map(|s| {
                let key = TriggerKey::parse(s);
                if key.is_none() {
                    eprintln!("ignoring unknown scope `{s}`");
                }
                key
            })
            .collect()
    };

    if keys.is_empty() {
        return;
    }
    println!("\nactions:");
    for key in keys {
        println!("  {key}:");
        for action in store.collect_actions(&key) {
            println!("    {action}");
        }
    }
}
