//! Output rendering and formatting

use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use console::Style;
use lspkg_index::RegistryItem;
use lspkg_types::{InstallationMethod, InstalledLanguageServer};

/// What a command produced
pub enum CommandResult {
    /// Generic success message
    Success(String),
    SearchResults(Vec<RegistryItem>),
    InstalledList(Vec<InstalledLanguageServer>),
    PackageInfo {
        item: Box<RegistryItem>,
        installed: Option<InstalledLanguageServer>,
    },
}

/// Output renderer for CLI results
#[derive(Clone)]
pub struct OutputRenderer {
    colors_enabled: bool,
}

impl OutputRenderer {
    /// Create new output renderer
    pub fn new(colors_enabled: bool) -> Self {
        Self { colors_enabled }
    }

    /// Render command result to stdout
    pub fn render_result(&self, result: &CommandResult) {
        match result {
            CommandResult::Success(message) => self.render_success_message(message),
            CommandResult::SearchResults(items) => self.render_search_results(items),
            CommandResult::InstalledList(servers) => self.render_installed(servers),
            CommandResult::PackageInfo { item, installed } => {
                self.render_package_info(item, installed.as_ref());
            }
        }
    }

    fn table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        if !self.colors_enabled {
            table.force_no_tty();
        }
        table
    }

    fn header(&self, text: &str) -> Cell {
        let cell = Cell::new(text).add_attribute(Attribute::Bold);
        if self.colors_enabled {
            cell.fg(Color::Cyan)
        } else {
            cell
        }
    }

    fn render_success_message(&self, message: &str) {
        let style = Style::new().green().force_styling(self.colors_enabled);
        println!("{}", style.apply_to(message));
    }

    fn render_search_results(&self, items: &[RegistryItem]) {
        if items.is_empty() {
            println!("No packages found.");
            return;
        }

        let mut table = self.table();
        table.set_header(vec![
            self.header("Package"),
            self.header("Version"),
            self.header("Languages"),
            self.header("Description"),
        ]);
        for item in items {
            table.add_row(vec![
                Cell::new(&item.name),
                Cell::new(item.version().unwrap_or_default()),
                Cell::new(item.languages.join(", ")),
                Cell::new(item.sanitized_description()),
            ]);
        }
        println!("{table}");
        println!("{} package(s)", items.len());
    }

    fn render_installed(&self, servers: &[InstalledLanguageServer]) {
        if servers.is_empty() {
            println!("No language servers installed.");
            return;
        }

        let mut table = self.table();
        table.set_header(vec![
            self.header("Package"),
            self.header("Version"),
            self.header("Enabled"),
        ]);
        for server in servers {
            let enabled = if server.is_enabled {
                Cell::new("yes")
            } else if self.colors_enabled {
                Cell::new("no").fg(Color::Yellow)
            } else {
                Cell::new("no")
            };
            table.add_row(vec![
                Cell::new(&server.package_name),
                Cell::new(&server.version),
                enabled,
            ]);
        }
        println!("{table}");
    }

    fn render_package_info(
        &self,
        item: &RegistryItem,
        installed: Option<&InstalledLanguageServer>,
    ) {
        let label = Style::new().bold().force_styling(self.colors_enabled);
        let field = |name: &str, value: &str| {
            if !value.is_empty() {
                println!("{:<12} {value}", label.apply_to(format!("{name}:")));
            }
        };

        field("Name", &item.sanitized_name());
        field("Package", &item.name);
        field("Version", &item.version().unwrap_or_default());
        field("Description", &item.sanitized_description());
        field("Homepage", &item.homepage_pretty());
        field("Languages", &item.languages.join(", "));
        field("Licenses", &item.licenses.join(", "));
        field("Source", &item.source.id);
        field("Install via", &method_description(&item.install_method()));
        match installed {
            Some(server) => field(
                "Installed",
                &format!(
                    "{}{}",
                    server.version,
                    if server.is_enabled { "" } else { " (disabled)" }
                ),
            ),
            None => field("Installed", "no"),
        }
    }
}

fn method_description(method: &InstallationMethod) -> String {
    match method {
        InstallationMethod::StandardPackage { source } => {
            source.manager.user_description().to_string()
        }
        InstallationMethod::BinaryDownload { url, .. } => format!("Download {url}"),
        InstallationMethod::SourceBuild { command, .. } => format!("Build from source: {command}"),
        InstallationMethod::Unknown => "not supported on this platform".to_string(),
    }
}
