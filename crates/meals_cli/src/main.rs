//! `meals` command-line front end.
//!
//! # Responsibility
//! - Parse flags and environment into a database path and logging setup.
//! - Drive catalog, schedule and timing use-cases and render their results.
//!
//! # Invariants
//! - stdout carries only command output (plain text or JSON with `--json`).
//! - Logging is opt-in through `--log-dir` and never writes to stdout.

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveTime};
use clap::{Args, Parser, Subcommand};
use log::debug;
use meals_core::db::open_db;
use meals_core::{
    parse_clock_time, CatalogService, Ingredient, LabelFilter, Meal, MealChoice, MealKind,
    MealListQuery, MealStats, MealSummary, RecipeDraft, ScheduleService, SqliteMealRepository,
    SqlitePlanRepository, SqliteTimingRepository, TimedStep, TimingService, TimingStep, Timings,
    WeekSlot,
};
use rusqlite::Connection;
use serde_json::json;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "meals")]
#[command(about = "Meal catalog and daily meal planner", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// SQLite database file
    #[arg(long, global = true, env = "MEALS_DB", default_value = "meals.sqlite3")]
    db: PathBuf,

    /// Log level: trace|debug|info|warn|error
    #[arg(long, global = true, env = "MEALS_LOG_LEVEL")]
    log_level: Option<String>,

    /// Directory for rolling log files; logging is off when unset
    #[arg(long, global = true, env = "MEALS_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(flatten)]
    Planner(PlannerCommand),

    /// Roast timing sheet
    Timings {
        #[command(subcommand)]
        action: TimingsCommand,
    },

    /// Print the core library version
    Version,
}

#[derive(Subcommand, Debug)]
enum PlannerCommand {
    /// Add a meal to the catalog
    Add(AddArgs),

    /// List meals, optionally filtered by labels (`category::value` or `category::*`)
    List {
        #[arg(long = "filter")]
        filters: Vec<String>,

        /// Only meals that have at least one ingredient
        #[arg(long)]
        with_ingredients: bool,
    },

    /// Suggest meals whose name starts with a prefix
    Search {
        prefix: String,
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Distinct labels in use
    Labels,

    /// Assign a meal to a date, replacing any previous assignment
    Plan(PlanArgs),

    /// Clear the assignment for a date
    Unplan { date: NaiveDate },

    /// Show seven days starting at `--start` (default: today)
    Week {
        #[arg(long)]
        start: Option<NaiveDate>,
    },

    /// Eaten count and last eaten date for one meal
    Stats { name: String },

    /// Every meal with its statistics
    Summary,

    /// Delete a meal that has never been planned
    Delete { name: String },
}

#[derive(Subcommand, Debug)]
enum TimingsCommand {
    /// Show the sheet with the clock time of every step
    Show,
    /// Store the first sheet; fails when one already exists
    Create(TimingsArgs),
    /// Create or replace the sheet
    Set(TimingsArgs),
}

#[derive(Args, Debug)]
struct TimingsArgs {
    /// Target finish time as HH:MM
    #[arg(long, value_parser = parse_clock_time)]
    finish: NaiveTime,

    /// Step as `offset description`, e.g. "-90 Lamb in"; repeatable
    #[arg(long = "step", allow_hyphen_values = true)]
    steps: Vec<String>,
}

#[derive(Args, Debug)]
struct AddArgs {
    name: String,

    /// Add as an ad-hoc meal without recipe detail
    #[arg(long, conflicts_with_all = ["instructions", "ingredients"])]
    other: bool,

    /// Label as `category::value`; repeatable
    #[arg(long = "label")]
    labels: Vec<String>,

    #[arg(long)]
    instructions: Option<String>,

    /// Ingredient line as `name quantity unit`; repeatable
    #[arg(long = "ingredient")]
    ingredients: Vec<String>,
}

#[derive(Args, Debug)]
struct PlanArgs {
    /// Meal name, matched ignoring case
    name: String,
    date: NaiveDate,

    /// Add the name as a new `other` meal when it is not in the catalog
    #[arg(long)]
    new_other: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_cli_logging(&cli)?;
    run(cli)
}

fn init_cli_logging(cli: &Cli) -> Result<()> {
    let Some(log_dir) = &cli.log_dir else {
        return Ok(());
    };
    let log_dir = absolute_path(log_dir)?;
    let level = cli
        .log_level
        .as_deref()
        .unwrap_or_else(|| meals_core::default_log_level());
    meals_core::init_logging(level, &log_dir).context("failed to initialize logging")
}

fn absolute_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("cannot resolve current directory")?;
    Ok(cwd.join(path))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Version => {
            let version = meals_core::core_version();
            emit(cli.json, json!({ "version": version }), version.to_string())
        }
        Commands::Timings { action } => run_timings(&cli.db, cli.json, action),
        Commands::Planner(command) => run_planner(&cli.db, cli.json, command),
    }
}

fn open_database(path: &Path) -> Result<Connection> {
    open_db(path).with_context(|| format!("failed to open database `{}`", path.display()))
}

fn run_planner(db: &Path, as_json: bool, command: PlannerCommand) -> Result<()> {
    let conn = open_database(db)?;
    let catalog = CatalogService::new(SqliteMealRepository::try_new(&conn)?);
    let ledger = ScheduleService::new(SqlitePlanRepository::try_new(&conn)?, &catalog);
    debug!("event=cli_dispatch module=cli status=start json={as_json}");

    match command {
        PlannerCommand::Add(args) => {
            let meal = add_meal(&catalog, args)?;
            emit(as_json, json!(meal), format!("added {}", describe_meal(&meal)))
        }
        PlannerCommand::List {
            filters,
            with_ingredients,
        } => {
            let query = MealListQuery {
                labels: LabelFilter::parse(filters.as_slice())?,
                with_ingredients_only: with_ingredients,
            };
            let meals = catalog.query_meals(&query)?;
            let text = meals.iter().map(describe_meal).collect::<Vec<_>>().join("\n");
            emit(as_json, json!(meals), text)
        }
        PlannerCommand::Search { prefix, limit } => {
            let meals = catalog.search_by_prefix(&prefix, limit)?;
            let text = meals
                .iter()
                .map(|meal| meal.name.clone())
                .collect::<Vec<_>>()
                .join("\n");
            emit(as_json, json!(meals), text)
        }
        PlannerCommand::Labels => {
            let labels = catalog.list_labels()?;
            let text = labels
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n");
            emit(as_json, json!(labels), text)
        }
        PlannerCommand::Plan(args) => {
            let choice = resolve_choice(&catalog, &args)?;
            let meal = ledger.assign_choice(args.date, &choice)?;
            emit(
                as_json,
                json!({ "day": args.date, "meal": meal }),
                format!("{} {}", args.date, meal.name),
            )
        }
        PlannerCommand::Unplan { date } => {
            let removed = ledger.unassign(date)?;
            let text = if removed {
                format!("cleared {date}")
            } else {
                format!("nothing planned on {date}")
            };
            emit(as_json, json!({ "day": date, "removed": removed }), text)
        }
        PlannerCommand::Week { start } => {
            let week = match start {
                Some(start) => ledger.get_week(start)?,
                None => ledger.current_week()?,
            };
            let text = render_week(&week);
            emit(as_json, json!(week), text)
        }
        PlannerCommand::Stats { name } => {
            let meal = catalog.require_by_name(&name)?;
            let stats = ledger.meal_stats(meal.id)?;
            emit(
                as_json,
                json!({ "meal_id": meal.id, "name": meal.name, "stats": stats }),
                format!("{}: {}", meal.name, render_stats(&stats)),
            )
        }
        PlannerCommand::Summary => {
            let summary = ledger.summarise()?;
            let text = render_summary(&summary);
            emit(as_json, json!(summary), text)
        }
        PlannerCommand::Delete { name } => {
            let meal = catalog.require_by_name(&name)?;
            catalog.delete_meal(meal.id)?;
            emit(
                as_json,
                json!({ "deleted": meal.id }),
                format!("deleted {}", meal.name),
            )
        }
    }
}

fn run_timings(db: &Path, as_json: bool, action: TimingsCommand) -> Result<()> {
    let conn = open_database(db)?;
    let timings = TimingService::new(SqliteTimingRepository::try_new(&conn)?);

    match action {
        TimingsCommand::Show => match timings.schedule()? {
            Some((sheet, steps)) => {
                let text = render_timings(&sheet, &steps);
                emit(
                    as_json,
                    json!({ "finish_time": sheet.finish_time, "steps": steps }),
                    text,
                )
            }
            None => emit(as_json, json!(null), "no timing sheet saved".to_string()),
        },
        TimingsCommand::Create(args) => {
            let sheet = build_timings(&args)?;
            timings.create(&sheet)?;
            emit(as_json, json!(sheet), format!("created {} step(s)", sheet.steps.len()))
        }
        TimingsCommand::Set(args) => {
            let sheet = build_timings(&args)?;
            let created = timings.save(&sheet)?;
            let verb = if created { "created" } else { "replaced" };
            emit(
                as_json,
                json!({ "created": created, "timings": sheet }),
                format!("{verb} {} step(s)", sheet.steps.len()),
            )
        }
    }
}

fn build_timings(args: &TimingsArgs) -> Result<Timings> {
    let steps = args
        .steps
        .iter()
        .map(|line| TimingStep::parse(line))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Timings::new(args.finish, steps))
}

fn add_meal(
    catalog: &CatalogService<SqliteMealRepository<'_>>,
    args: AddArgs,
) -> Result<Meal> {
    if args.other {
        return Ok(catalog.add_meal(&args.name, MealKind::Other, args.labels.as_slice())?);
    }

    let ingredients = args
        .ingredients
        .iter()
        .map(|line| Ingredient::parse(line))
        .collect::<Result<Vec<_>, _>>()?;
    let draft = RecipeDraft {
        name: args.name,
        instructions: args.instructions.unwrap_or_default(),
        ingredients,
        labels: args.labels,
    };
    Ok(catalog.add_recipe(&draft)?)
}

fn resolve_choice(
    catalog: &CatalogService<SqliteMealRepository<'_>>,
    args: &PlanArgs,
) -> Result<MealChoice> {
    match catalog.find_by_name(&args.name)? {
        Some(meal) => Ok(MealChoice::ExistingMealRef(meal.id)),
        None if args.new_other => Ok(MealChoice::NewOtherMeal(args.name.clone())),
        None => bail!(
            "no meal named `{}`; pass --new-other to add it as an `other` meal",
            args.name.trim()
        ),
    }
}

fn describe_meal(meal: &Meal) -> String {
    if meal.labels.is_empty() {
        return format!("{} ({})", meal.name, meal.kind);
    }
    let labels = meal
        .labels
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("{} ({}) [{}]", meal.name, meal.kind, labels)
}

fn render_stats(stats: &MealStats) -> String {
    match stats.last_eaten {
        Some(day) => format!("eaten {} time(s), last on {day}", stats.eaten_count),
        None => "never eaten".to_string(),
    }
}

fn render_week(week: &[WeekSlot]) -> String {
    week.iter()
        .map(|slot| {
            let meal = slot.meal.as_ref().map_or("-", |meal| meal.name.as_str());
            format!("{} {} {meal}", slot.day, slot.day.format("%a"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_timings(sheet: &Timings, steps: &[TimedStep]) -> String {
    let mut lines = vec![format!("finish {}", sheet.finish_time.format("%H:%M"))];
    for step in steps {
        let day_note = match step.days_before {
            0 => String::new(),
            days => format!(" ({days} day(s) before)"),
        };
        lines.push(format!(
            "{} {:>5} {}{day_note}",
            step.at.format("%H:%M"),
            step.offset_minutes,
            step.description
        ));
    }
    lines.join("\n")
}

fn render_summary(summary: &[MealSummary]) -> String {
    summary
        .iter()
        .map(|row| format!("{} ({}): {}", row.name, row.kind, render_stats(&row.stats)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn emit(as_json: bool, value: serde_json::Value, text: String) -> Result<()> {
    let rendered = if as_json {
        serde_json::to_string_pretty(&value)?
    } else {
        text
    };
    write_stdout_line(&rendered)
}

fn write_stdout_line(text: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        build_timings, render_stats, render_week, resolve_choice, run, Cli, Commands, PlanArgs,
        PlannerCommand, TimingsCommand,
    };
    use chrono::{NaiveDate, NaiveTime};
    use clap::Parser;
    use meals_core::db::open_db_in_memory;
    use meals_core::{CatalogService, MealChoice, MealKind, MealStats, SqliteMealRepository, WeekSlot};

    fn day(value: &str) -> NaiveDate {
        value.parse().unwrap()
    }

    #[test]
    fn add_collects_repeated_labels_and_ingredients() {
        let cli = Cli::try_parse_from([
            "meals",
            "add",
            "Carrot Soup",
            "--label",
            "time::quick",
            "--label",
            "diet::veggie",
            "--ingredient",
            "Carrot 10 units",
            "--instructions",
            "Simmer",
        ])
        .unwrap();

        let Commands::Planner(PlannerCommand::Add(args)) = cli.command else {
            panic!("expected add command");
        };
        assert_eq!(args.labels, vec!["time::quick", "diet::veggie"]);
        assert_eq!(args.ingredients, vec!["Carrot 10 units"]);
        assert!(!args.other);
    }

    #[test]
    fn other_meal_cannot_take_recipe_detail() {
        let result = Cli::try_parse_from(["meals", "add", "Take Away", "--other", "--instructions", "x"]);
        assert!(result.is_err());
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from(["meals", "week", "--start", "2024-01-01", "--json", "--db", "/tmp/m.db"])
            .unwrap();
        assert!(cli.json);
        assert_eq!(cli.db.to_str(), Some("/tmp/m.db"));
        assert!(matches!(cli.command, Commands::Planner(PlannerCommand::Week { start: Some(start) }) if start == day("2024-01-01")));
    }

    #[test]
    fn plan_rejects_malformed_dates() {
        assert!(Cli::try_parse_from(["meals", "plan", "Curry", "2024-13-01"]).is_err());
    }

    #[test]
    fn plan_resolves_existing_names_and_gates_new_ones() {
        let conn = open_db_in_memory().unwrap();
        let catalog = CatalogService::new(SqliteMealRepository::try_new(&conn).unwrap());
        let curry = catalog.add_meal("Curry", MealKind::Recipe, &[] as &[&str]).unwrap();

        let plan = |name: &str, new_other| PlanArgs {
            name: name.to_string(),
            date: day("2024-01-01"),
            new_other,
        };
        assert_eq!(
            resolve_choice(&catalog, &plan("curry", false)).unwrap(),
            MealChoice::ExistingMealRef(curry.id)
        );
        assert_eq!(
            resolve_choice(&catalog, &plan("Chippy", true)).unwrap(),
            MealChoice::NewOtherMeal("Chippy".to_string())
        );
        assert!(resolve_choice(&catalog, &plan("Chippy", false)).is_err());
    }

    #[test]
    fn text_rendering_marks_empty_days_and_never_eaten() {
        let week = vec![WeekSlot {
            day: day("2024-01-01"),
            meal: None,
        }];
        assert_eq!(render_week(&week), "2024-01-01 Mon -");
        assert_eq!(render_stats(&MealStats::default()), "never eaten");
    }

    #[test]
    fn timings_set_accepts_negative_step_offsets() {
        let cli = Cli::try_parse_from([
            "meals",
            "timings",
            "set",
            "--finish",
            "18:30",
            "--step",
            "-90 Lamb in",
            "--step",
            "0 Serve",
        ])
        .unwrap();

        let Commands::Timings {
            action: TimingsCommand::Set(args),
        } = cli.command
        else {
            panic!("expected timings set command");
        };
        assert_eq!(args.finish, NaiveTime::from_hms_opt(18, 30, 0).unwrap());
        let sheet = build_timings(&args).unwrap();
        assert_eq!(sheet.steps[0].offset_minutes, -90);
        assert_eq!(sheet.steps[1].description, "Serve");
    }

    #[test]
    fn timings_reject_bad_clock_and_step_text() {
        assert!(Cli::try_parse_from(["meals", "timings", "set", "--finish", "25:00"]).is_err());

        let cli = Cli::try_parse_from([
            "meals", "timings", "create", "--finish", "18:00", "--step", "Lamb in",
        ])
        .unwrap();
        let Commands::Timings {
            action: TimingsCommand::Create(args),
        } = cli.command
        else {
            panic!("expected timings create command");
        };
        assert!(build_timings(&args).is_err());
    }

    #[test]
    fn list_parses_ingredient_filter_flag() {
        let cli = Cli::try_parse_from(["meals", "list", "--with-ingredients", "--filter", "carb::*"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Planner(PlannerCommand::List {
                with_ingredients: true,
                ..
            })
        ));
    }

    #[test]
    fn version_does_not_touch_the_database() {
        let dir = std::env::temp_dir().join(format!("meals-cli-version-{}", std::process::id()));
        let db = dir.join("never-created.sqlite3");
        let db_arg = db.to_str().unwrap().to_string();

        let cli = Cli::try_parse_from(["meals", "version", "--db", db_arg.as_str()]).unwrap();
        run(cli).unwrap();
        assert!(!db.exists());
    }
}
