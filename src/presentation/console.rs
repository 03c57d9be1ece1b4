// Interactive console - Line-oriented commands over the migration service
use crate::application::card_classifier::{
    CardConflict, ConflictChoice, ConflictDecider, ConflictPolicy, FixedDecider,
};
use crate::application::error::GatewayResult;
use crate::application::migration_service::{MigrationOutcome, MigrationService, PreviewReport};
use crate::domain::dashboard::DashboardSummary;
use std::io::{self, BufRead, Write};

const HELP: &str = "\
Commands:
  HELP          Show this help
  LS            List source dashboards
  LT            List target dashboards
  DRYCOPY [id]  Preview the migration of a source dashboard
  COPY [id]     Migrate a source dashboard after confirmation
  TEST          Test the connection to both instances
  EXIT          Quit";

/// First DNS label of an instance URL, used in the prompt.
pub fn platform_name(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
        .and_then(|host| host.split('.').next().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

/// Console input and output. Also answers card conflicts by asking the user.
pub struct ConsoleIo<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> ConsoleIo<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Next trimmed line, `None` at end of input.
    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn ask(&mut self, question: &str) -> io::Result<Option<String>> {
        write!(self.output, "{question}")?;
        self.output.flush()?;
        self.read_line()
    }

    fn ask_choice(&mut self, conflict: &CardConflict<'_>) -> io::Result<Option<ConflictChoice>> {
        writeln!(
            self.output,
            "Card '{}' ({} #{}) already exists on target as #{}.",
            conflict.card.name,
            conflict.card.type_label(),
            conflict.card.id,
            conflict.existing_target_id
        )?;
        loop {
            let Some(answer) = self.ask("Skip (S) / Override (O) / Skip All (SA): ")? else {
                return Ok(None);
            };
            match answer.parse::<ConflictChoice>() {
                Ok(choice) => return Ok(Some(choice)),
                Err(e) => writeln!(self.output, "{e}")?,
            }
        }
    }
}

impl<R: BufRead, W: Write> ConflictDecider for ConsoleIo<R, W> {
    fn decide(&mut self, conflict: &CardConflict<'_>) -> ConflictChoice {
        match self.ask_choice(conflict) {
            Ok(Some(choice)) => choice,
            Ok(None) => {
                tracing::warn!(card_id = conflict.card.id, "Input ended during conflict prompt, skipping card");
                ConflictChoice::Skip
            }
            Err(e) => {
                tracing::warn!(card_id = conflict.card.id, error = %e, "Failed to read conflict choice, skipping card");
                ConflictChoice::Skip
            }
        }
    }
}

fn decider_for<'a, R, W>(policy: ConflictPolicy, io: &'a mut ConsoleIo<R, W>) -> Box<dyn ConflictDecider + 'a>
where
    R: BufRead + 'a,
    W: Write + 'a,
{
    match policy {
        ConflictPolicy::Prompt => Box::new(io),
        ConflictPolicy::Skip => Box::new(FixedDecider(ConflictChoice::Skip)),
        ConflictPolicy::Override => Box::new(FixedDecider(ConflictChoice::Override)),
    }
}

pub fn write_dashboards(out: &mut dyn Write, dashboards: &[DashboardSummary]) -> io::Result<()> {
    if dashboards.is_empty() {
        return writeln!(out, "No dashboards found.");
    }
    for dashboard in dashboards {
        writeln!(out, "{:>6}  {}", dashboard.id, dashboard.name)?;
    }
    Ok(())
}

pub fn write_report(out: &mut dyn Write, report: &PreviewReport) -> io::Result<()> {
    writeln!(out, "Dashboard {}: {}", report.dashboard_id, report.dashboard_name)?;
    match report.collection_id {
        Some(id) => writeln!(out, "  Collection: {id}")?,
        None => writeln!(out, "  Collection: root")?,
    }
    writeln!(out, "  Tabs: {}", report.tab_count)?;
    writeln!(out, "  Dependencies:")?;
    if report.dependencies.is_empty() {
        writeln!(out, "    (none)")?;
    }
    for row in &report.dependencies {
        write!(out, "    {} / {} / {} => {}", row.kind, row.id, row.name, row.action)?;
        match row.existing_target_id {
            Some(existing) => writeln!(out, " (target #{existing})")?,
            None => writeln!(out)?,
        }
    }
    Ok(())
}

pub fn write_outcome(out: &mut dyn Write, outcome: &MigrationOutcome) -> io::Result<()> {
    let verb = if outcome.dashboard_created { "created" } else { "updated" };
    writeln!(
        out,
        "Migration completed: target dashboard {} ({verb})",
        outcome.target_dashboard_id
    )?;
    writeln!(
        out,
        "  Cards created: {}, updated: {}, reused: {}",
        outcome.cards_created, outcome.cards_updated, outcome.cards_reused
    )?;
    if outcome.dropped_placements > 0 {
        writeln!(out, "  Dropped placements: {}", outcome.dropped_placements)?;
    }
    for (kind, source_id, target_id) in outcome.identifiers.entries() {
        writeln!(out, "  {kind} {source_id} -> {target_id}")?;
    }
    for (kind, source_id) in outcome.identifiers.unresolved() {
        writeln!(out, "  Unresolved {kind} {source_id}")?;
    }
    Ok(())
}

#[derive(Debug, PartialEq)]
enum Command {
    Help,
    ListSource,
    ListTarget,
    DryCopy(Option<String>),
    Copy(Option<String>),
    Test,
    Exit,
    Empty,
    Unknown(String),
}

fn parse_command(line: &str) -> Command {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Command::Empty;
    };
    let argument = parts.next().map(str::to_string);
    match verb.to_uppercase().as_str() {
        "HELP" => Command::Help,
        "LS" => Command::ListSource,
        "LT" => Command::ListTarget,
        "DRYCOPY" => Command::DryCopy(argument),
        "COPY" => Command::Copy(argument),
        "TEST" => Command::Test,
        "EXIT" | "QUIT" => Command::Exit,
        _ => Command::Unknown(verb.to_string()),
    }
}

pub struct Console<R, W> {
    service: MigrationService,
    io: ConsoleIo<R, W>,
    policy: ConflictPolicy,
    label: String,
    listed: bool,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(service: MigrationService, io: ConsoleIo<R, W>, policy: ConflictPolicy) -> Self {
        let label = format!(
            "[{} > {}]",
            platform_name(service.source_url()),
            platform_name(service.target_url())
        );
        Self {
            service,
            io,
            policy,
            label,
            listed: false,
        }
    }

    pub fn into_io(self) -> ConsoleIo<R, W> {
        self.io
    }

    /// Reads commands until `EXIT` or end of input.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        writeln!(self.io.output, "Dashboard migrator. Type HELP for commands.")?;
        loop {
            let prompt = format!("{} ", self.label);
            let Some(line) = self.io.ask(&prompt)? else {
                writeln!(self.io.output)?;
                break;
            };
            match parse_command(&line) {
                Command::Empty => {}
                Command::Help => writeln!(self.io.output, "{HELP}")?,
                Command::ListSource => {
                    let result = self.service.list_source_dashboards().await;
                    self.show_dashboards(result)?;
                }
                Command::ListTarget => {
                    let result = self.service.list_target_dashboards().await;
                    self.show_dashboards(result)?;
                }
                Command::DryCopy(argument) => {
                    if let Some(id) = self.dashboard_id(argument)? {
                        self.migrate_one(id, true, false).await?;
                    }
                }
                Command::Copy(argument) => {
                    if let Some(id) = self.dashboard_id(argument)? {
                        self.migrate_one(id, false, false).await?;
                    }
                }
                Command::Test => {
                    self.test_connections().await?;
                }
                Command::Exit => break,
                Command::Unknown(verb) => {
                    writeln!(self.io.output, "Unknown command '{verb}'. Type HELP for commands.")?
                }
            }
        }
        Ok(())
    }

    fn show_dashboards(
        &mut self,
        result: GatewayResult<Vec<DashboardSummary>>,
    ) -> io::Result<()> {
        match result {
            Ok(dashboards) => {
                self.listed = true;
                write_dashboards(&mut self.io.output, &dashboards)
            }
            Err(e) => writeln!(self.io.output, "Error: {e}"),
        }
    }

    fn dashboard_id(&mut self, argument: Option<String>) -> io::Result<Option<i64>> {
        if !self.listed {
            writeln!(self.io.output, "Run LS or LT first to list dashboards.")?;
            return Ok(None);
        }
        let raw = match argument {
            Some(raw) => raw,
            None => match self.io.ask("Dashboard id: ")? {
                Some(raw) => raw,
                None => return Ok(None),
            },
        };
        match raw.parse::<i64>() {
            Ok(id) if id > 0 => Ok(Some(id)),
            _ => {
                writeln!(self.io.output, "Invalid dashboard id '{raw}'.")?;
                Ok(None)
            }
        }
    }

    /// Previews a dashboard and, unless `dry_run`, migrates it after
    /// confirmation. Returns whether the command succeeded.
    pub async fn migrate_one(&mut self, dashboard_id: i64, dry_run: bool, assume_yes: bool) -> anyhow::Result<bool> {
        let preview = {
            let mut decider = decider_for(self.policy, &mut self.io);
            self.service.preview(dashboard_id, decider.as_mut()).await
        };
        let report = match preview {
            Ok(report) => report,
            Err(e) => {
                writeln!(self.io.output, "Error: {:#}", anyhow::Error::from(e))?;
                return Ok(false);
            }
        };
        write_report(&mut self.io.output, &report)?;
        if dry_run {
            return Ok(true);
        }

        if !assume_yes {
            let question = format!("Migrate '{}' to the target? (Y/N): ", report.dashboard_name);
            let confirmed = self
                .io
                .ask(&question)?
                .is_some_and(|answer| answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"));
            if !confirmed {
                writeln!(self.io.output, "Migration cancelled.")?;
                return Ok(false);
            }
        }

        let migrated = {
            let mut decider = decider_for(self.policy, &mut self.io);
            self.service.migrate(dashboard_id, decider.as_mut()).await
        };
        match migrated {
            Ok(outcome) => {
                write_outcome(&mut self.io.output, &outcome)?;
                Ok(true)
            }
            Err(e) => {
                tracing::error!(dashboard_id, error = %e, "Migration failed");
                writeln!(self.io.output, "Migration failed: {:#}", anyhow::Error::from(e))?;
                Ok(false)
            }
        }
    }

    /// Returns whether both instances answered.
    pub async fn test_connections(&mut self) -> anyhow::Result<bool> {
        let mut all_ok = true;
        for check in self.service.test_connections().await {
            match check.result {
                Ok(()) => writeln!(self.io.output, "{} ({}): OK", check.role, check.url)?,
                Err(e) => {
                    all_ok = false;
                    writeln!(self.io.output, "{} ({}): FAILED - {e}", check.role, check.url)?;
                }
            }
        }
        Ok(all_ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::migration_service::MigrationOptions;
    use crate::application::test_support::{card, placement, Call, InMemoryGateway};
    use crate::domain::card::Card;
    use crate::domain::dashboard::Dashboard;
    use std::sync::Arc;

    type TestConsole = Console<&'static [u8], Vec<u8>>;

    fn gateways() -> (Arc<InMemoryGateway>, Arc<InMemoryGateway>) {
        let source = InMemoryGateway::new("https://old-bi.example.com").with_dashboard(Dashboard {
            id: 1,
            name: "Sales".to_string(),
            dashcards: vec![placement(card(1, "Revenue"), None), placement(card(2, "Churn"), None)],
            ..Default::default()
        });
        let target = InMemoryGateway::new("https://new-bi.example.com").with_card(card(500, "Churn"));
        (Arc::new(source), Arc::new(target))
    }

    fn console(source: &Arc<InMemoryGateway>, target: &Arc<InMemoryGateway>, input: &'static str) -> TestConsole {
        let service = MigrationService::new(source.clone(), target.clone(), MigrationOptions::default());
        Console::new(service, ConsoleIo::new(input.as_bytes(), Vec::new()), ConflictPolicy::Prompt)
    }

    fn output(console: TestConsole) -> String {
        String::from_utf8(console.into_io().into_output()).unwrap()
    }

    fn conflict_card() -> Card {
        card(2, "Churn")
    }

    #[test]
    fn test_platform_name() {
        assert_eq!(platform_name("https://analytics.example.com/"), "analytics");
        assert_eq!(platform_name("http://localhost:3000"), "localhost");
        assert_eq!(platform_name("not a url"), "not a url");
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("drycopy 12"), Command::DryCopy(Some("12".to_string())));
        assert_eq!(parse_command("COPY"), Command::Copy(None));
        assert_eq!(parse_command("  "), Command::Empty);
        assert_eq!(parse_command("rm -rf"), Command::Unknown("rm".to_string()));
    }

    #[test]
    fn test_decider_reprompts_until_valid() {
        let mut io = ConsoleIo::new("maybe\n sa \n".as_bytes(), Vec::new());
        let card = conflict_card();

        let choice = io.decide(&CardConflict {
            card: &card,
            existing_target_id: 500,
        });

        assert_eq!(choice, ConflictChoice::SkipAll);
        let printed = String::from_utf8(io.into_output()).unwrap();
        assert!(printed.contains("invalid choice 'maybe'"));
        assert_eq!(printed.matches("Skip (S) / Override (O) / Skip All (SA)").count(), 2);
    }

    #[test]
    fn test_decider_skips_at_end_of_input() {
        let mut io = ConsoleIo::new("".as_bytes(), Vec::new());
        let card = conflict_card();

        let choice = io.decide(&CardConflict {
            card: &card,
            existing_target_id: 500,
        });

        assert_eq!(choice, ConflictChoice::Skip);
    }

    #[tokio::test]
    async fn test_copy_requires_listing_first() {
        let (source, target) = gateways();
        let mut console = console(&source, &target, "DRYCOPY 1\nEXIT\n");

        console.run().await.unwrap();

        assert!(output(console).contains("Run LS or LT first"));
        assert!(!source.calls().contains(&Call::GetDashboard(1)));
    }

    #[tokio::test]
    async fn test_drycopy_prints_dependencies() {
        let (source, target) = gateways();
        let mut console = console(&source, &target, "ls\ndrycopy 1\nO\nexit\n");

        console.run().await.unwrap();

        let printed = output(console);
        assert!(printed.contains("[old-bi > new-bi]"));
        assert!(printed.contains("question / 1 / Revenue => New"));
        assert!(printed.contains("question / 2 / Churn => Override (target #500)"));
        assert!(target.created_cards().is_empty());
    }

    #[tokio::test]
    async fn test_copy_prompts_for_id_and_confirms() {
        let (source, target) = gateways();
        let mut console = console(&source, &target, "LT\nCOPY\n1\nS\nY\n");

        console.run().await.unwrap();

        let printed = output(console);
        assert!(printed.contains("Dashboard id: "));
        assert!(printed.contains("Migration completed"));
        assert!(printed.contains("Cards created: 1, updated: 0, reused: 1"));
        assert_eq!(target.created_cards().len(), 1);
    }

    #[tokio::test]
    async fn test_declined_confirmation_writes_nothing() {
        let (source, target) = gateways();
        let mut console = console(&source, &target, "LS\nCOPY 1\nS\nn\nEXIT\n");

        console.run().await.unwrap();

        assert!(output(console).contains("Migration cancelled."));
        assert!(target.created_cards().is_empty());
        assert!(!target.calls().iter().any(|c| matches!(c, Call::CreateDashboard(_))));
    }

    #[tokio::test]
    async fn test_non_numeric_id_is_rejected() {
        let (source, target) = gateways();
        let mut console = console(&source, &target, "LS\nDRYCOPY abc\n");

        console.run().await.unwrap();

        assert!(output(console).contains("Invalid dashboard id 'abc'."));
    }

    #[tokio::test]
    async fn test_skip_policy_never_prompts() {
        let (source, target) = gateways();
        let service = MigrationService::new(source.clone(), target.clone(), MigrationOptions::default());
        let mut console = Console::new(service, ConsoleIo::new("".as_bytes(), Vec::new()), ConflictPolicy::Skip);

        let ok = console.migrate_one(1, false, true).await.unwrap();

        assert!(ok);
        let printed = output(console);
        assert!(!printed.contains("Skip (S)"));
        assert!(printed.contains("reused: 1"));
        assert!(printed.contains("  card 2 -> 500"));
    }

    #[tokio::test]
    async fn test_unknown_command_is_reported() {
        let (source, target) = gateways();
        let mut console = console(&source, &target, "frobnicate\n");

        console.run().await.unwrap();

        assert!(output(console).contains("Unknown command 'frobnicate'"));
    }
}
