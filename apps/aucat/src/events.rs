//! Event handling and progress display

use crate::logging::log_event_with_tracing;
use aucat_events::{
    AppEvent, AuthEvent, EventMessage, GeneralEvent, InstallEvent, ProgressEvent, ProgressPhase,
    UninstallEvent,
};
use console::{Style, Term};

/// Renders engine events on stderr and forwards them to tracing.
pub struct EventHandler {
    term: Term,
    colors_enabled: bool,
    debug_enabled: bool,
    /// Last rendered percentage, to skip redundant progress lines
    last_percent: Option<u32>,
}

impl EventHandler {
    pub fn new(colors_enabled: bool, debug_enabled: bool) -> Self {
        Self {
            term: Term::stderr(),
            colors_enabled,
            debug_enabled,
            last_percent: None,
        }
    }

    /// Handle one incoming event
    pub fn handle_event(&mut self, message: EventMessage) {
        log_event_with_tracing(&message);

        match message.event {
            AppEvent::Install(event) => self.handle_install(event),
            AppEvent::Uninstall(event) => self.handle_uninstall(event),
            AppEvent::Progress(progress) => self.handle_progress(&progress),
            AppEvent::Auth(event) => self.handle_auth(event),
            AppEvent::General(event) => self.handle_general(event),
            AppEvent::Download(_) => {}
        }
    }

    fn handle_install(&mut self, event: InstallEvent) {
        match event {
            InstallEvent::Started {
                package,
                version,
                steps,
            } => {
                self.last_percent = None;
                self.show_status(&format!("Installing {package} {version} ({steps} steps)"));
            }
            InstallEvent::SourceResolved { kind, location, .. } if self.debug_enabled => {
                self.show_status(&format!("  source ({kind}): {location}"));
            }
            InstallEvent::Completed { package, version } => {
                self.clear_progress();
                self.show_success(&format!("Installed {package} {version}"));
            }
            InstallEvent::Failed { package, failure, .. } => {
                self.clear_progress();
                self.show_error(&format!("Install of {package} failed: {}", failure.message));
            }
            _ => {}
        }
    }

    fn handle_uninstall(&mut self, event: UninstallEvent) {
        match event {
            UninstallEvent::Started { package, steps } => {
                self.last_percent = None;
                self.show_status(&format!("Uninstalling {package} ({steps} steps)"));
            }
            UninstallEvent::PathRemoved { path, existed, .. } => {
                if existed {
                    self.show_status(&format!("  removed {path}"));
                } else if self.debug_enabled {
                    self.show_status(&format!("  not found {path}"));
                }
            }
            UninstallEvent::Completed { package } => {
                self.clear_progress();
                self.show_success(&format!("Uninstalled {package}"));
            }
            UninstallEvent::Failed { package, failure } => {
                self.clear_progress();
                self.show_error(&format!("Uninstall of {package} failed: {}", failure.message));
            }
        }
    }

    fn handle_progress(&mut self, progress: &ProgressEvent) {
        if matches!(progress.phase, ProgressPhase::Init | ProgressPhase::Error) {
            return;
        }
        if self.last_percent == Some(progress.percent) {
            return;
        }
        self.last_percent = Some(progress.percent);

        let step = match (progress.step_index, progress.phase) {
            (_, ProgressPhase::Done) | (None, _) => String::new(),
            (Some(index), _) => format!(" [{}/{}]", index + 1, progress.total_steps),
        };
        let line = format!("{:>3}% {}{step}", progress.percent, progress.label);
        if self.term.is_term() {
            let _ = self.term.clear_line();
            let _ = self.term.write_str(&line);
            if progress.phase == ProgressPhase::Done {
                let _ = self.term.write_line("");
            }
        } else {
            let _ = self.term.write_line(&line);
        }
    }

    fn handle_auth(&mut self, event: AuthEvent) {
        match event {
            AuthEvent::LoginRequired { url } => {
                self.clear_progress();
                self.show_warning(&format!("Store login required for {url}"));
            }
            AuthEvent::LoginRejected { url } => {
                self.show_error(&format!("Store session was refused for {url}"));
            }
            AuthEvent::LoginCompleted { .. } | AuthEvent::SurfaceClosed => {}
        }
    }

    fn handle_general(&mut self, event: GeneralEvent) {
        match event {
            GeneralEvent::Warning { message, context } => {
                let text = match context {
                    Some(context) => format!("{message}: {context}"),
                    None => message,
                };
                self.show_warning(&text);
            }
            GeneralEvent::DebugLog { message } if self.debug_enabled => {
                self.show_status(&message);
            }
            _ => {}
        }
    }

    fn clear_progress(&mut self) {
        if self.term.is_term() && self.last_percent.is_some() {
            let _ = self.term.clear_line();
        }
        self.last_percent = None;
    }

    fn show_status(&self, message: &str) {
        let _ = self.term.write_line(message);
    }

    fn show_success(&self, message: &str) {
        self.styled(message, &Style::new().green().bold());
    }

    fn show_warning(&self, message: &str) {
        self.styled(&format!("warning: {message}"), &Style::new().yellow());
    }

    fn show_error(&self, message: &str) {
        self.styled(&format!("error: {message}"), &Style::new().red().bold());
    }

    fn styled(&self, message: &str, style: &Style) {
        let line = if self.colors_enabled {
            style.apply_to(message).to_string()
        } else {
            message.to_string()
        };
        let _ = self.term.write_line(&line);
    }
}
