//! Event handling and progress display

use console::{Style, Term};
use lspkg_events::{AppEvent, DownloadEvent, InstallEvent, RegistryEvent};

/// Renders events on the terminal as they arrive
pub struct EventHandler {
    term: Term,
    debug_enabled: bool,
    step: Style,
    output: Style,
    success: Style,
    warning: Style,
    error: Style,
}

impl EventHandler {
    /// Create new event handler
    pub fn new(colors_enabled: bool, debug_enabled: bool) -> Self {
        let style = |s: Style| s.force_styling(colors_enabled);
        Self {
            term: Term::stderr(),
            debug_enabled,
            step: style(Style::new().cyan().bold()),
            output: style(Style::new().dim()),
            success: style(Style::new().green()),
            warning: style(Style::new().yellow()),
            error: style(Style::new().red().bold()),
        }
    }

    /// Handle incoming event
    pub fn handle_event(&mut self, event: AppEvent) {
        crate::logging::log_event_with_tracing(&event);
        if let Some(line) = self.render(&event) {
            self.term.write_line(&line).unwrap_or(());
        }
    }

    /// Terminal line for `event`, `None` for events that stay in the log
    fn render(&self, event: &AppEvent) -> Option<String> {
        match event {
            AppEvent::Install(event) => self.render_install(event),
            AppEvent::Registry(event) => self.render_registry(event),
            AppEvent::Download(event) => self.render_download(event),
        }
    }

    fn render_install(&self, event: &InstallEvent) -> Option<String> {
        match event {
            InstallEvent::OperationStarted { package, steps } => Some(format!(
                "Installing {package} ({steps} step{})",
                if *steps == 1 { "" } else { "s" }
            )),
            InstallEvent::StepStarted {
                step, index, total, ..
            } => Some(
                self.step
                    .apply_to(format!("[{}/{total}] {step}", index + 1))
                    .to_string(),
            ),
            // Step dividers duplicate StepStarted
            InstallEvent::OutputLine {
                line,
                is_step_divider: false,
                ..
            } => Some(self.output.apply_to(format!("  {line}")).to_string()),
            InstallEvent::OperationCompleted { package, version } => Some(
                self.success
                    .apply_to(format!("Installed {package} {version}"))
                    .to_string(),
            ),
            InstallEvent::OperationFailed {
                package,
                step,
                failure,
                details,
            } => {
                let mut text = format!(
                    "Installation of {package} failed at \"{step}\": {}",
                    failure.message
                );
                if let Some(reason) = &failure.reason {
                    text.push_str(&format!("\n  Reason: {reason}"));
                }
                if self.debug_enabled {
                    if let Some(details) = details {
                        text.push_str(&format!("\n  Details: {details}"));
                    }
                }
                Some(self.error.apply_to(text).to_string())
            }
            InstallEvent::OperationCancelled { package } => Some(
                self.warning
                    .apply_to(format!("Installation of {package} cancelled"))
                    .to_string(),
            ),
            _ => None,
        }
    }

    fn render_registry(&self, event: &RegistryEvent) -> Option<String> {
        match event {
            RegistryEvent::RefreshStarted { url } => {
                Some(format!("Downloading registry from {url}"))
            }
            RegistryEvent::AttemptFailed {
                attempt,
                max_attempts,
                error,
                ..
            } => Some(
                self.warning
                    .apply_to(format!("Attempt {attempt}/{max_attempts} failed: {error}"))
                    .to_string(),
            ),
            RegistryEvent::RefreshCompleted { packages, .. } => Some(
                self.success
                    .apply_to(format!("Registry updated: {packages} packages"))
                    .to_string(),
            ),
            RegistryEvent::CacheSaveFailed { path, error } => Some(
                self.warning
                    .apply_to(format!("Could not cache registry at {path}: {error}"))
                    .to_string(),
            ),
            RegistryEvent::CacheLoaded { .. }
            | RegistryEvent::RefreshFailed { .. }
            | RegistryEvent::PackageRecorded { .. }
            | RegistryEvent::PackageRemoved { .. }
            | RegistryEvent::PackageToggled { .. } => None,
        }
    }

    fn render_download(&self, event: &DownloadEvent) -> Option<String> {
        match event {
            DownloadEvent::Completed {
                url, final_size, ..
            } if self.debug_enabled => Some(
                self.output
                    .apply_to(format!("  Downloaded {url} ({final_size} bytes)"))
                    .to_string(),
            ),
            _ => None,
        }
    }
}
