use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use mealshift_core::{
    DayPlanDraft, DayPlanStore, KernelError, MacroTargets, Proposal, RedistributionKernel,
    time::{local_day, local_time_to_utc},
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

mod config;
mod logging;
mod render;
mod state;

use config::Config;
use state::FileStore;

#[derive(Parser, Debug)]
#[command(name = "mealshift", version, about = "Rebalance the rest of your day's meals after a deviation")]
struct Cli {
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage ~/.mealshift/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Import or show a day plan
    Plan {
        #[command(subcommand)]
        command: PlanCommand,
    },

    /// Log a meal into a window and evaluate the day
    Log {
        /// Window id as written in the imported plan
        #[arg(long)]
        window: String,

        #[arg(long, default_value_t = 0.0)]
        protein: f64,

        #[arg(long, default_value_t = 0.0)]
        carbs: f64,

        #[arg(long, default_value_t = 0.0)]
        fat: f64,

        /// Local time the meal was eaten (HH:MM, default: now)
        #[arg(long)]
        at: Option<String>,

        /// Day (YYYY-MM-DD, default: today in the configured timezone)
        #[arg(long)]
        day: Option<NaiveDate>,
    },

    /// Advance window states and look for a deviation
    Check {
        /// Evaluate as of this local time (HH:MM, default: now)
        #[arg(long)]
        at: Option<String>,

        #[arg(long)]
        day: Option<NaiveDate>,

        /// Show what would change without storing anything
        #[arg(long, default_value_t = false)]
        preview: bool,
    },

    /// Commit the pending proposal
    Accept,

    /// Discard the pending proposal
    Reject,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default config if none exists
    Init,
    /// Print the effective config
    Show,
}

#[derive(Subcommand, Debug)]
enum PlanCommand {
    /// Load a TOML day description
    Import {
        #[arg(long)]
        file: PathBuf,

        #[arg(long)]
        day: Option<NaiveDate>,

        /// Replace an existing plan for the same day
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Print a stored day plan
    Show {
        #[arg(long)]
        day: Option<NaiveDate>,
    },
}

struct App {
    cfg: Config,
    json: bool,
    kernel: RedistributionKernel<FileStore>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let home = state::ensure_mealshift_home()?;
    let cfg = config::load_config(&home)?;
    logging::init(&cfg.logging)?;
    debug!(home = %home.display(), "loaded config");

    let mut app = App {
        cfg,
        json: cli.json,
        kernel: RedistributionKernel::new(FileStore::new(&home)),
    };

    match cli.command {
        Command::Config { command } => run_config(&command, &home, &app.cfg, app.json),
        Command::Plan { command } => match command {
            PlanCommand::Import { file, day, force } => app.import(&file, day, force),
            PlanCommand::Show { day } => app.show(day),
        },
        Command::Log {
            window,
            protein,
            carbs,
            fat,
            at,
            day,
        } => {
            let meal = MacroTargets::new(protein, carbs, fat)?;
            app.log(&window, meal, at.as_deref(), day)
        }
        Command::Check { at, day, preview } => app.check(at.as_deref(), day, preview),
        Command::Accept => app.resolve(true),
        Command::Reject => app.resolve(false),
    }
}

fn run_config(command: &ConfigCommand, home: &Path, cfg: &Config, json: bool) -> Result<()> {
    match command {
        ConfigCommand::Init => {
            let (path, created) = config::init_config(home)?;
            if created {
                println!("Wrote {}", path.display());
            } else {
                println!("Config already exists: {}", path.display());
            }
        }
        ConfigCommand::Show => {
            if json {
                println!("{}", serde_json::to_string_pretty(cfg)?);
            } else {
                print!("{}", toml::to_string_pretty(cfg).context("serialize config")?);
            }
        }
    }
    Ok(())
}

impl App {
    fn timezone(&self) -> &str {
        &self.cfg.profile.timezone
    }

    fn day_or_today(&self, day: Option<NaiveDate>) -> Result<NaiveDate> {
        match day {
            Some(d) => Ok(d),
            None => local_day(Utc::now(), self.timezone()),
        }
    }

    fn instant(&self, day: NaiveDate, at: Option<&str>) -> Result<DateTime<Utc>> {
        match at {
            Some(hhmm) => local_time_to_utc(day, hhmm, self.timezone()),
            None => Ok(Utc::now()),
        }
    }

    fn print_json<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    fn import(&mut self, file: &Path, day: Option<NaiveDate>, force: bool) -> Result<()> {
        let day = self.day_or_today(day)?;
        let raw = fs::read_to_string(file).with_context(|| format!("read {}", file.display()))?;
        let mut draft: DayPlanDraft =
            toml::from_str(&raw).with_context(|| format!("parse {}", file.display()))?;
        if draft.bedtime.is_none() {
            draft.bedtime = self.cfg.profile.bedtime.clone();
        }

        if self.kernel.store().load(day)?.is_some() && !force {
            bail!("a plan for {day} already exists (pass --force to replace it)");
        }

        let plan = draft.into_plan(day)?;
        self.kernel.install(&plan)?;
        // Revisions restart with a new plan, so an old proposal could match by accident.
        self.kernel.store().clear_pending()?;

        if self.json {
            return self.print_json(&plan);
        }
        println!("Imported {} windows for {day}", plan.windows().len());
        print!("{}", render::plan_text(&plan, self.cfg.tz()?));
        Ok(())
    }

    fn show(&self, day: Option<NaiveDate>) -> Result<()> {
        let day = self.day_or_today(day)?;
        let plan = self.kernel.plan(day)?;
        if self.json {
            return self.print_json(&plan);
        }
        print!("{}", render::plan_text(&plan, self.cfg.tz()?));
        if let Some(p) = self.kernel.store().load_pending()? {
            if p.day == day {
                println!("\nA proposal is pending: run `mealshift accept` or `mealshift reject`.");
            }
        }
        Ok(())
    }

    fn log(&mut self, window: &str, meal: MacroTargets, at: Option<&str>, day: Option<NaiveDate>) -> Result<()> {
        let day = self.day_or_today(day)?;
        let at = self.instant(day, at)?;
        let proposal = self.kernel.log_meal(day, window, meal, at)?;
        if !self.json {
            println!("Logged {} kcal into '{window}'.", meal.total_calories());
        }
        self.report(proposal)
    }

    fn check(&mut self, at: Option<&str>, day: Option<NaiveDate>, preview: bool) -> Result<()> {
        let day = self.day_or_today(day)?;
        let now = self.instant(day, at)?;
        if preview {
            let proposal = self.kernel.preview(day, now)?;
            return self.show_proposal(proposal.as_ref());
        }
        let proposal = self.kernel.tick(day, now)?;
        self.report(proposal)
    }

    /// Store a fresh proposal as pending and print it.
    fn report(&mut self, proposal: Option<Proposal>) -> Result<()> {
        match &proposal {
            // Nothing to accept, so the source deviation is settled right away.
            Some(p) if p.result.is_noop() => {
                self.kernel.reject(p)?;
            }
            Some(p) => self.kernel.store().save_pending(p)?,
            None => {}
        }
        self.show_proposal(proposal.as_ref())
    }

    fn show_proposal(&self, proposal: Option<&Proposal>) -> Result<()> {
        if self.json {
            return self.print_json(&proposal);
        }
        match proposal {
            None => println!("On track: no adjustment needed."),
            Some(p) => {
                print!("{}", render::result_text(&p.result));
                if !p.result.is_preview && !p.result.is_noop() {
                    println!("\nRun `mealshift accept` or `mealshift reject`.");
                }
            }
        }
        Ok(())
    }

    fn resolve(&mut self, accept: bool) -> Result<()> {
        let store = self.kernel.store().clone();
        let Some(proposal) = store.load_pending()? else {
            bail!("no pending proposal (run `mealshift check` first)");
        };

        let outcome = if accept {
            self.kernel.accept(&proposal)
        } else {
            self.kernel.reject(&proposal)
        };

        let plan = match outcome {
            Ok(plan) => plan,
            Err(err @ KernelError::StaleProposal { .. }) => {
                warn!(%err, "dropping stale proposal");
                store.clear_pending()?;
                bail!("{err}; the day changed since it was computed, run `mealshift check` again");
            }
            Err(err) => return Err(err.into()),
        };
        store.clear_pending()?;

        if self.json {
            return self.print_json(&plan);
        }
        println!("{}", if accept { "Accepted." } else { "Rejected; targets unchanged." });
        print!("{}", render::plan_text(&plan, self.cfg.tz()?));
        Ok(())
    }
}
