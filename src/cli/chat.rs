//! CLI command handlers for the chat REPL and the tool listing.

use std::io::Write;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::agent::Assistant;
use crate::agent_loop::ControlCommand;
use crate::config::OmniConfig;
use crate::tools::{
    BuiltinSource, CapabilityContext, CommandInstaller, Dependency, DependencyInstaller,
    ToolRegistry,
};
use crate::types::UserInput;

use super::ConfigArgs;

/// Handle `omni chat`.
pub async fn handle_chat(args: &ConfigArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.load()?;
    let mut assistant =
        Assistant::from_config_with(&config, Arc::new(BuiltinSource), stdin_installer(&config))
            .await?;

    println!(
        "omni ({} / {}). Type 'reset', 'refresh' or 'quit'.",
        config.provider,
        config.resolved_model()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let input = UserInput::text(line);
        let quitting = ControlCommand::parse(&input) == Some(ControlCommand::Quit);
        println!("{}", assistant.send(input).await);
        if quitting {
            break;
        }
    }

    let usage = assistant.token_usage();
    tracing::info!(
        used = usage.used(),
        percent = usage.percent_used(),
        "Session ended"
    );
    Ok(())
}

/// Handle `omni tools`.
pub async fn handle_tools(args: &ConfigArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.load()?;
    let context = CapabilityContext {
        family: config.family(),
        model: config.resolved_model(),
        temperature: config.temperature,
    };
    let mut registry =
        ToolRegistry::new(context, Arc::new(BuiltinSource)).with_installer(stdin_installer(&config));
    let descriptors = registry.load().await?;

    if descriptors.is_empty() {
        println!("No tools available for provider {}", config.provider);
    }
    for descriptor in descriptors {
        println!("{:<16} {}", descriptor.name, descriptor.description);
    }
    Ok(())
}

/// Installer that asks on the terminal and runs `install_command`.
fn stdin_installer(config: &OmniConfig) -> Arc<dyn DependencyInstaller> {
    Arc::new(CommandInstaller::new(
        config.install_command.clone(),
        confirm_on_stdin,
    ))
}

fn confirm_on_stdin(plugin_id: &str, dependency: &Dependency) -> bool {
    eprint!(
        "Tool '{plugin_id}' needs {}. Install {}? [y/N] ",
        dependency.name, dependency.package
    );
    let _ = std::io::stderr().flush();

    let mut answer = String::new();
    if std::io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    is_yes(&answer)
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_explicit_yes_confirms() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes(""));
        assert!(!is_yes("n"));
        assert!(!is_yes("yep"));
    }
}
