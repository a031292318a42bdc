use clap::{Parser, Subcommand};
use pocket_ssot::commands::{self, RecordKind};
use pocket_ssot::core::context::SsotContext;
use pocket_ssot::core::error::{SsotError, print_error};
use pocket_ssot::core::logging;
use std::path::PathBuf;

/// Single source of truth for configuration entities, with templated releases
#[derive(Parser)]
#[command(name = "ssot")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(styles = get_styles())]
struct Cli {
  /// Config file (default: pocket-ssot.toml discovery)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Store directory (overrides config and POCKET_SSOT_STORE)
  #[arg(long, global = true)]
  store: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  // ============================================================================
  // Inspection
  // ============================================================================
  /// List records of one kind
  List {
    /// Record kind
    #[arg(value_enum)]
    kind: RecordKind,
    /// Only records belonging to this collection (id or name)
    #[arg(long)]
    collection: Option<String>,
    /// Output results in JSON format
    #[arg(long)]
    json: bool,
  },

  /// Show one record (YAML by default)
  Show {
    /// Record kind
    #[arg(value_enum)]
    kind: RecordKind,
    /// Record id or name
    id: String,
    /// Output in JSON format
    #[arg(long)]
    json: bool,
  },

  // ============================================================================
  // Editing
  // ============================================================================
  /// Create a collection, entity or release channel
  #[command(subcommand)]
  Create(CreateCommands),

  /// Set one field on an entity (value is parsed as JSON when possible)
  SetField {
    /// Entity id or name
    entity: String,
    /// Field name
    field: String,
    /// New value
    value: String,
    /// Output result in JSON format
    #[arg(long)]
    json: bool,
  },

  // ============================================================================
  // Releases
  // ============================================================================
  /// Run a release and record its outcome
  #[command(subcommand)]
  Release(ReleaseCommands),
}

#[derive(Subcommand)]
enum CreateCommands {
  /// Create a collection
  Collection {
    /// Collection name
    name: String,
    /// Explicit id (default: random UUID)
    #[arg(long)]
    id: Option<String>,
    /// Channel used for collection releases (id or name)
    #[arg(long)]
    collection_channel: Option<String>,
    /// Channel used for entity releases (id or name)
    #[arg(long)]
    entity_channel: Option<String>,
  },

  /// Create an entity in a collection
  Entity {
    /// Entity name
    name: String,
    /// Owning collection (id or name)
    #[arg(long)]
    collection: String,
    /// Explicit id (default: random UUID)
    #[arg(long)]
    id: Option<String>,
    /// Field as key=value (repeatable)
    #[arg(long = "field", value_name = "KEY=VALUE")]
    fields: Vec<String>,
  },

  /// Create a release channel
  Channel {
    /// Channel name
    name: String,
    /// Explicit id (default: random UUID)
    #[arg(long)]
    id: Option<String>,
    /// YAML file with the channel definition (steps)
    #[arg(long)]
    from: Option<PathBuf>,
  },
}

#[derive(Subcommand)]
enum ReleaseCommands {
  /// Release a collection with all of its entities
  Collection {
    /// Collection id or name
    collection: String,
    /// Use this channel instead of the collection's configured one
    #[arg(long)]
    channel: Option<String>,
    /// Output the release record in JSON format
    #[arg(long)]
    json: bool,
  },

  /// Release a single entity
  Entity {
    /// Entity id or name
    entity: String,
    /// Use this channel instead of the collection's configured one
    #[arg(long)]
    channel: Option<String>,
    /// Output the release record in JSON format
    #[arg(long)]
    json: bool,
  },
}

fn get_styles() -> clap::builder::Styles {
  clap::builder::Styles::styled()
    .usage(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Cyan))),
    )
    .header(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Cyan))),
    )
    .literal(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
    .invalid(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .error(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .placeholder(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))))
}

fn main() {
  let cli = Cli::parse();

  let cwd = match std::env::current_dir() {
    Ok(dir) => dir,
    Err(e) => {
      eprintln!("Error: Failed to get current directory: {}", e);
      std::process::exit(1);
    }
  };

  let ctx = match SsotContext::build(&cwd, cli.config.as_deref(), cli.store) {
    Ok(ctx) => ctx,
    Err(e) => handle_error(e),
  };
  logging::init(&ctx.config.log.filter);

  let result = match cli.command {
    // Inspection
    Commands::List { kind, collection, json } => commands::run_list(&ctx, kind, collection, json),
    Commands::Show { kind, id, json } => commands::run_show(&ctx, kind, &id, json),

    // Editing
    Commands::Create(create_cmd) => match create_cmd {
      CreateCommands::Collection {
        name,
        id,
        collection_channel,
        entity_channel,
      } => commands::run_create_collection(&ctx, &name, id, collection_channel, entity_channel),
      CreateCommands::Entity {
        name,
        collection,
        id,
        fields,
      } => commands::run_create_entity(&ctx, &name, &collection, id, &fields),
      CreateCommands::Channel { name, id, from } => commands::run_create_channel(&ctx, &name, id, from.as_deref()),
    },
    Commands::SetField {
      entity,
      field,
      value,
      json,
    } => commands::run_set_field(&ctx, &entity, &field, &value, json),

    // Releases
    Commands::Release(release_cmd) => match release_cmd {
      ReleaseCommands::Collection {
        collection,
        channel,
        json,
      } => commands::run_release_collection(&ctx, &collection, channel, json),
      ReleaseCommands::Entity { entity, channel, json } => commands::run_release_entity(&ctx, &entity, channel, json),
    },
  };

  if let Err(err) = result {
    handle_error(err);
  }
}

fn handle_error(err: SsotError) -> ! {
  print_error(&err);
  std::process::exit(err.exit_code().as_i32());
}
