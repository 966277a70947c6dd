use crate::config::LayoutConfig;
use crate::error::Result;
use crate::shell::{self, Shell};
use crate::utils::shell::quote_path;
use serde::Serialize;

/// The two init-script services on the box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    Server,
    Agent,
}

impl Service {
    pub fn name(&self) -> &'static str {
        match self {
            Service::Server => "go-server",
            Service::Agent => "go-agent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Start,
    Stop,
    Restart,
}

impl Action {
    fn verb(&self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::Stop => "stop",
            Action::Restart => "restart",
        }
    }
}

pub fn command(layout: &LayoutConfig, service: Service, action: Action) -> String {
    let script = layout.init_dir.join(service.name());
    match action {
        // A stopped server makes `stop` fail; that is fine here.
        Action::Stop => format!("{} stop 2>/dev/null || true", quote_path(&script)),
        _ => format!("{} {}", quote_path(&script), action.verb()),
    }
}

/// Run the init script and return the command issued.
pub fn control(shell: &dyn Shell, layout: &LayoutConfig, service: Service, action: Action) -> Result<String> {
    let cmd = command(layout, service, action);
    shell::run(shell, &cmd, &cmd)?;
    Ok(cmd)
}

pub fn restart_server(shell: &dyn Shell, layout: &LayoutConfig) -> Result<()> {
    control(shell, layout, Service::Server, Action::Restart).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::DryRunShell;

    #[test]
    fn stop_tolerates_an_already_stopped_server() {
        let layout = LayoutConfig::default();
        assert_eq!(
            command(&layout, Service::Server, Action::Stop),
            "'/etc/init.d/go-server' stop 2>/dev/null || true"
        );
    }

    #[test]
    fn restart_and_start_use_init_scripts() {
        let shell = DryRunShell::new();
        let layout = LayoutConfig::default();
        restart_server(&shell, &layout).unwrap();
        let issued = control(&shell, &layout, Service::Agent, Action::Start).unwrap();
        assert_eq!(issued, "'/etc/init.d/go-agent' start");
        assert_eq!(
            shell.history(),
            vec![
                "'/etc/init.d/go-server' restart".to_string(),
                "'/etc/init.d/go-agent' start".to_string(),
            ]
        );
    }
}
