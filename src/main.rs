//! PlanPilot CLI - track goals, milestones, and tasks with live sync.

use clap::Parser;
use planpilot::cli::{Cli, Commands, GoalCommands, MilestoneCommands, SystemCommands, TaskCommands};
use planpilot::commands::{self, Output};
use planpilot::config;
use std::path::Path;
use std::process;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // PP_LOG=debug pp ... for diagnostics; silent by default.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("PP_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let data_dir = match config::resolve_data_dir(cli.data_dir) {
        Ok(dir) => dir,
        Err(e) => {
            report_error(&e, cli.human_readable);
            process::exit(1);
        }
    };

    // -H wins; otherwise the configured default format applies.
    let human = cli.human_readable
        || matches!(
            config::Config::load(&data_dir).map(|c| c.output_format),
            Ok(config::OutputFormat::Human)
        );

    if let Err(e) = run_command(cli.command, &data_dir, human).await {
        report_error(&e, human);
        process::exit(1);
    }
}

fn report_error(e: &planpilot::Error, human: bool) {
    if human {
        eprintln!("Error: {}", e);
    } else {
        eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
    }
}

async fn run_command(
    command: Commands,
    data_dir: &Path,
    human: bool,
) -> Result<(), planpilot::Error> {
    match command {
        Commands::System { command } => match command {
            SystemCommands::Init => {
                let result = commands::system_init(data_dir)?;
                output(&result, human);
            }
            SystemCommands::Status => {
                let result = commands::system_status(data_dir).await?;
                output(&result, human);
            }
            SystemCommands::Version => {
                let result = commands::version();
                output(&result, human);
            }
        },

        Commands::Login { user } => {
            let result = commands::login(data_dir, &user)?;
            output(&result, human);
        }

        Commands::Logout => {
            let result = commands::logout(data_dir)?;
            output(&result, human);
        }

        Commands::Goal { command } => match command {
            GoalCommands::Add {
                name,
                timeframe,
                measurable,
                achievable,
                relevance,
                bandwidth,
            } => {
                let result = commands::goal_add(
                    data_dir, name, timeframe, measurable, achievable, relevance, bandwidth,
                )
                .await?;
                output(&result, human);
            }

            GoalCommands::Refine {
                what,
                why,
                when,
                backend,
            } => {
                let result = commands::goal_refine(data_dir, what, why, when, backend).await?;
                output(&result, human);
            }

            GoalCommands::List => {
                let result = commands::goal_list(data_dir).await?;
                output(&result, human);
            }

            GoalCommands::Show { id } => {
                let result = commands::goal_show(data_dir, &id).await?;
                output(&result, human);
            }

            GoalCommands::Update {
                id,
                name,
                timeframe,
                measurable,
                achievable,
                relevance,
                bandwidth,
            } => {
                let result = commands::goal_update(
                    data_dir, &id, name, timeframe, measurable, achievable, relevance, bandwidth,
                )
                .await?;
                output(&result, human);
            }

            GoalCommands::Rm { id } => {
                let result = commands::goal_rm(data_dir, &id).await?;
                output(&result, human);
            }

            GoalCommands::Progress { id } => {
                let result = commands::goal_progress(data_dir, &id).await?;
                output(&result, human);
            }
        },

        Commands::Milestone { command } => match command {
            MilestoneCommands::Add {
                goal_id,
                name,
                description,
                weeks,
            } => {
                let result =
                    commands::milestone_add(data_dir, &goal_id, name, description, weeks).await?;
                output(&result, human);
            }

            MilestoneCommands::List { goal_id } => {
                let result = commands::milestone_list(data_dir, &goal_id).await?;
                output(&result, human);
            }

            MilestoneCommands::Done { goal_id, id } => {
                let result = commands::milestone_done(data_dir, &goal_id, &id).await?;
                output(&result, human);
            }

            MilestoneCommands::Rm { goal_id, id } => {
                let result = commands::milestone_rm(data_dir, &goal_id, &id).await?;
                output(&result, human);
            }
        },

        Commands::Task { command } => match command {
            TaskCommands::Add {
                goal_id,
                milestone_id,
                name,
                date,
                simplicity,
                urgency,
                importance,
            } => {
                let result = commands::task_add(
                    data_dir,
                    &goal_id,
                    &milestone_id,
                    name,
                    date,
                    simplicity,
                    urgency,
                    importance,
                )
                .await?;
                output(&result, human);
            }

            TaskCommands::List {
                goal_id,
                milestone_id,
            } => {
                let result = commands::task_list(data_dir, &goal_id, &milestone_id).await?;
                output(&result, human);
            }

            TaskCommands::Done {
                goal_id,
                milestone_id,
                id,
            } => {
                let result = commands::task_done(data_dir, &goal_id, &milestone_id, &id).await?;
                output(&result, human);
            }

            TaskCommands::Update {
                goal_id,
                milestone_id,
                id,
                name,
                date,
                simplicity,
                urgency,
                importance,
            } => {
                let result = commands::task_update(
                    data_dir,
                    &goal_id,
                    &milestone_id,
                    &id,
                    name,
                    date,
                    simplicity,
                    urgency,
                    importance,
                )
                .await?;
                output(&result, human);
            }

            TaskCommands::Rm {
                goal_id,
                milestone_id,
                id,
            } => {
                let result = commands::task_rm(data_dir, &goal_id, &milestone_id, &id).await?;
                output(&result, human);
            }
        },

        Commands::Today => {
            let result = commands::today(data_dir).await?;
            output(&result, human);
        }

        Commands::Plan { goal_id, backend } => {
            let result = commands::plan(data_dir, &goal_id, backend).await?;
            output(&result, human);
        }

        Commands::Watch => {
            commands::watch(data_dir).await?;
        }

        #[cfg(feature = "gui")]
        Commands::Gui { port, host } => {
            planpilot::gui::start_server(data_dir, port, &host)
                .await
                .map_err(|e| planpilot::Error::Other(e.to_string()))?;
        }
    }

    Ok(())
}

fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}
