use clap::{Args, Parser, Subcommand, ValueEnum};
use lnticket::application::admin::AdminView;
use lnticket::application::payment::PaymentOutcome;
use lnticket::application::submission::SubmissionView;
use lnticket::config::Config;
use lnticket::domain::form::{Form, PublicForm};
use lnticket::domain::ports::{ConfirmBox, NotifierRef, TicketApiRef};
use lnticket::domain::pricing::{PricingRule, amount_label};
use lnticket::infrastructure::http::HttpTicketApi;
use lnticket::infrastructure::notify::AutoConfirm;
use lnticket::interfaces::console::{ConsoleNotifier, PromptConfirm};
use miette::{IntoDiagnostic, Result, miette};
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON config file. Defaults to $LNTICKET_CONFIG.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Extension base url, overriding the config file.
    #[arg(long, global = true)]
    url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Price a text without contacting the backend
    Quote {
        /// Flat amount, or amount per word
        #[arg(long)]
        amount: u64,
        /// Charge a flat rate instead of per word
        #[arg(long)]
        flat: bool,
        text: String,
    },
    /// Manage the operator's forms
    Forms {
        #[command(subcommand)]
        command: FormsCommand,
    },
    /// Inspect and delete paid tickets
    Tickets {
        #[command(subcommand)]
        command: TicketsCommand,
    },
    /// Export a table as CSV
    Export {
        table: Table,
        /// Output file. Defaults to stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Submit a ticket, print its invoice and wait until it is paid
    Submit {
        form_id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        text: String,
        /// Price locally instead of looking the form up (needs no key)
        #[arg(long)]
        amount: Option<u64>,
        #[arg(long, requires = "amount")]
        flat: bool,
    },
}

#[derive(Subcommand)]
enum FormsCommand {
    List,
    Create(CreateFormArgs),
    Update(UpdateFormArgs),
    Delete {
        id: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum TicketsCommand {
    List,
    Show {
        id: String,
    },
    Delete {
        id: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Table {
    Forms,
    Tickets,
}

#[derive(Args)]
struct CreateFormArgs {
    #[arg(long)]
    wallet: String,
    #[arg(long)]
    name: String,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long)]
    webhook: Option<String>,
    #[arg(long)]
    flat: bool,
    #[arg(long)]
    amount: u64,
}

#[derive(Args)]
struct UpdateFormArgs {
    id: String,
    #[arg(long)]
    wallet: Option<String>,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    webhook: Option<String>,
    #[arg(long)]
    flat: Option<bool>,
    #[arg(long)]
    amount: Option<u64>,
}

struct App {
    config: Config,
    api: TicketApiRef,
    notifier: NotifierRef,
}

impl App {
    fn admin(&self, skip_confirm: bool) -> Result<AdminView> {
        let confirm: ConfirmBox = if skip_confirm {
            Box::new(AutoConfirm(true))
        } else {
            Box::new(PromptConfirm)
        };
        AdminView::new(
            self.api.clone(),
            self.notifier.clone(),
            confirm,
            self.config.wallets.clone(),
            self.config.read_key.clone(),
        )
        .into_diagnostic()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Command::Quote { amount, flat, text } = &cli.command {
        let rule = PricingRule::from_form_fields(*flat, *amount);
        println!("{}", amount_label(rule.cost(text)));
        return Ok(());
    }

    let mut config = Config::load(cli.config.as_deref()).into_diagnostic()?;
    if let Some(url) = cli.url {
        config.base_url = url;
    }
    let api = HttpTicketApi::new(&config.base_url, config.request_timeout())
        .into_diagnostic()?;
    let app = App {
        config,
        api: Arc::new(api),
        notifier: Arc::new(ConsoleNotifier::new()),
    };

    match cli.command {
        Command::Quote { .. } => Ok(()),
        Command::Forms { command } => forms(&app, command).await,
        Command::Tickets { command } => tickets(&app, command).await,
        Command::Export { table, out } => export(&app, table, out).await,
        Command::Submit {
            form_id,
            name,
            email,
            text,
            amount,
            flat,
        } => {
            let form = match amount {
                Some(amount) => PublicForm {
                    id: form_id.clone(),
                    name: form_id,
                    description: String::new(),
                    pricing: PricingRule::from_form_fields(flat, amount),
                },
                None => {
                    let mut admin = app.admin(true)?;
                    admin.load_forms().await.into_diagnostic()?;
                    admin
                        .forms()
                        .iter()
                        .find(|f| f.id == form_id)
                        .map(PublicForm::from)
                        .ok_or_else(|| miette!("form {} not found", form_id))?
                }
            };
            submit(&app, form, name, email, text).await
        }
    }
}

fn describe(form: &Form, base_url: &str) -> String {
    let pricing = match form.pricing() {
        PricingRule::FlatRate { amount } => format!("{amount} sats flat"),
        PricingRule::PerWord { amount_per_word } => format!("{amount_per_word} sats/word"),
    };
    format!(
        "{}\t{}\t{}\t{}\tmade {} sats\t{}",
        form.id,
        form.wallet,
        form.name,
        pricing,
        form.amountmade,
        form.public_url(base_url)
    )
}

async fn forms(app: &App, command: FormsCommand) -> Result<()> {
    match command {
        FormsCommand::List => {
            let mut admin = app.admin(true)?;
            admin.load_forms().await.into_diagnostic()?;
            for form in admin.forms() {
                println!("{}", describe(form, &app.config.base_url));
            }
        }
        FormsCommand::Create(args) => {
            let mut admin = app.admin(true)?;
            let draft = admin.draft_mut();
            draft.wallet = Some(args.wallet);
            draft.name = args.name;
            draft.description = args.description;
            draft.webhook = args.webhook;
            draft.flatrate = args.flat;
            draft.amount = args.amount;
            let form = admin.save_form().await.into_diagnostic()?;
            println!("{}", describe(&form, &app.config.base_url));
        }
        FormsCommand::Update(args) => {
            let mut admin = app.admin(true)?;
            admin.load_forms().await.into_diagnostic()?;
            admin.edit_form(&args.id).into_diagnostic()?;
            let draft = admin.draft_mut();
            if let Some(wallet) = args.wallet {
                draft.wallet = Some(wallet);
            }
            if let Some(name) = args.name {
                draft.name = name;
            }
            if let Some(description) = args.description {
                draft.description = description;
            }
            if let Some(webhook) = args.webhook {
                draft.webhook = Some(webhook);
            }
            if let Some(flat) = args.flat {
                draft.flatrate = flat;
            }
            if let Some(amount) = args.amount {
                draft.amount = amount;
            }
            let form = admin.save_form().await.into_diagnostic()?;
            println!("{}", describe(&form, &app.config.base_url));
        }
        FormsCommand::Delete { id, yes } => {
            let mut admin = app.admin(yes)?;
            admin.load_forms().await.into_diagnostic()?;
            if admin.delete_form(&id).await.into_diagnostic()? {
                println!("deleted form {id}");
            }
        }
    }
    Ok(())
}

async fn tickets(app: &App, command: TicketsCommand) -> Result<()> {
    match command {
        TicketsCommand::List => {
            let mut admin = app.admin(true)?;
            admin.load_tickets().await.into_diagnostic()?;
            for ticket in admin.tickets() {
                println!(
                    "{}\t{}\t{}\t{}\t{}\t{} sats",
                    ticket.id,
                    ticket.date(),
                    ticket.form,
                    ticket.name,
                    ticket.email,
                    ticket.sats
                );
            }
        }
        TicketsCommand::Show { id } => {
            let mut admin = app.admin(true)?;
            admin.load_tickets().await.into_diagnostic()?;
            let card = admin
                .ticket_card(&id)
                .ok_or_else(|| miette!("ticket {} not found", id))?;
            println!("Date: {}", card.date);
            println!("Name: {}", card.name);
            println!("Email: {}", card.email);
            println!();
            println!("{}", card.content);
        }
        TicketsCommand::Delete { id, yes } => {
            let mut admin = app.admin(yes)?;
            admin.load_tickets().await.into_diagnostic()?;
            if admin.delete_ticket(&id).await.into_diagnostic()? {
                println!("deleted ticket {id}");
            }
        }
    }
    Ok(())
}

async fn export(app: &App, table: Table, out: Option<PathBuf>) -> Result<()> {
    let mut admin = app.admin(true)?;
    let sink: Box<dyn Write> = match out {
        Some(path) => Box::new(File::create(path).into_diagnostic()?),
        None => Box::new(io::stdout().lock()),
    };
    match table {
        Table::Forms => {
            admin.load_forms().await.into_diagnostic()?;
            admin.export_forms_csv(sink).into_diagnostic()
        }
        Table::Tickets => {
            admin.load_tickets().await.into_diagnostic()?;
            admin.export_tickets_csv(sink).into_diagnostic()
        }
    }
}

async fn submit(app: &App, form: PublicForm, name: String, email: String, text: String) -> Result<()> {
    let mut view = SubmissionView::new(
        app.api.clone(),
        app.notifier.clone(),
        form,
        app.config.poll,
    );
    let fields = view.fields_mut();
    fields.name = name;
    fields.email = email;
    fields.text = text;
    eprintln!("{}", view.amount_label());

    let invoice = view.submit().await.into_diagnostic()?;
    println!("{}", invoice.payment_request);

    let outcome = tokio::select! {
        outcome = view.wait_for_payment() => outcome,
        _ = tokio::signal::ctrl_c() => None,
    };
    let outcome = match outcome {
        Some(outcome) => Some(outcome),
        None => view.close_dialog().await,
    };

    match outcome {
        Some(PaymentOutcome::Paid) | Some(PaymentOutcome::Cancelled) | None => Ok(()),
        Some(PaymentOutcome::TimedOut) => Err(miette!("payment was not received in time")),
        Some(PaymentOutcome::Failed { reason }) => Err(miette!("{}", reason)),
    }
}
