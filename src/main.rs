use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use library_admin::{
    AppState, BannerKind, BookForm, Config, FineAssessment, FineCategory, FineForm, Id, LibraryApi,
    LoanForm, MemberForm, PageEvent, Session, SessionEvent, YearFilter, loan_years,
    loans_per_month,
};

/// Administrative client for the library backend
#[derive(Parser, Debug)]
#[command(name = "library_admin")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign in and store the token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Forget the stored token
    Logout,

    /// Show the signed-in user
    Whoami,

    /// List members, or show one
    Members {
        #[arg(long)]
        id: Option<String>,
    },

    /// Add a member, or update one with --id
    MemberSave {
        #[arg(long)]
        id: Option<String>,
        /// 16-digit national ID
        #[arg(long)]
        national_id: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        address: String,
        /// YYYY-MM-DD
        #[arg(long)]
        birth_date: NaiveDate,
    },

    /// Delete a member
    MemberDelete {
        id: String,
        #[arg(long)]
        confirm: bool,
    },

    /// List books
    Books,

    /// Add a book, or update one with --id
    BookSave {
        #[arg(long)]
        id: Option<String>,
        #[arg(long, default_value = "")]
        shelf_code: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        author: String,
        #[arg(long, default_value = "")]
        publisher: String,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long, default_value_t = 0)]
        stock: u32,
        #[arg(long, default_value = "")]
        detail: String,
    },

    /// Delete a book
    BookDelete {
        id: String,
        #[arg(long)]
        confirm: bool,
    },

    /// List loans, optionally one member's history
    Loans {
        #[arg(long)]
        member: Option<String>,
    },

    /// Lend a book to a member
    Borrow {
        #[arg(long)]
        member: String,
        #[arg(long)]
        book: String,
        #[arg(long)]
        loan_date: NaiveDate,
        #[arg(long)]
        due_date: NaiveDate,
    },

    /// Mark a loan returned, charging any late fee
    Return { id: String },

    /// Loans per month
    Chart {
        #[arg(long)]
        year: Option<i32>,
    },

    /// List fines, optionally one member's
    Fines {
        #[arg(long)]
        member: Option<String>,
    },

    /// Record a fine by hand
    FineAdd {
        #[arg(long)]
        member: String,
        #[arg(long)]
        book: Option<String>,
        #[arg(long)]
        amount: i64,
        /// late, damage or other
        #[arg(long, default_value = "other")]
        category: FineCategory,
        #[arg(long, default_value = "")]
        description: String,
    },

    /// Delete a fine
    FineDelete {
        id: String,
        #[arg(long)]
        confirm: bool,
    },

    /// Fine count and total per member
    Totals,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,library_admin=info".into()),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let token = load_token(&config.token_path).await?;
    let session = Session::new(token);
    let mut events = session.subscribe();
    let state = AppState::new(config.clone(), session.clone())?;

    let result = run(&state, cli.command).await;

    while let Ok(event) = events.try_recv() {
        if let SessionEvent::Expired { redirect } = event {
            warn!(?redirect, "session expired");
            eprintln!("Session expired. Run `library_admin login` again.");
        }
    }
    if let Some(banner) = state.banners.current(BannerKind::Success) {
        eprintln!("{}", banner.text);
    }
    store_token(&config.token_path, session.token()).await?;
    result
}

async fn run(state: &AppState, command: Commands) -> Result<()> {
    match command {
        Commands::Login { email, password } => {
            state.login(&email, &password).await?;
            eprintln!("Signed in.");
        }
        Commands::Logout => state.logout(),
        Commands::Whoami => print_json(&state.verify().await?)?,

        Commands::Members { id } => {
            let directory = state.member_directory();
            let members = directory.list().await?;
            match id {
                Some(id) => {
                    let id = Id::from(id);
                    directory.navigate(PageEvent::OpenDetail(id.clone())).await?;
                    let ledger = state.fine_ledger();
                    let loans = state.loan_manager(ledger.clone());
                    loans.list_loans(Some(&id)).await?;
                    ledger.list_fines().await?;
                    print_json(&serde_json::json!({
                        "member": directory.member(&id).await?,
                        "loans": loans.rows().await,
                        "fines": ledger.fine_history_for_member(&id).await,
                    }))?;
                }
                None => print_json(&members)?,
            }
        }
        Commands::MemberSave {
            id,
            national_id,
            name,
            address,
            birth_date,
        } => {
            let directory = state.member_directory();
            let form = MemberForm {
                national_id,
                name,
                address,
                birth_date: Some(birth_date),
            };
            match id {
                Some(id) => directory.update(&Id::from(id), &form).await?,
                None => directory.create(&form).await?,
            }
        }
        Commands::MemberDelete { id, confirm } => {
            let directory = state.member_directory();
            directory.list().await?;
            let confirmation = directory.request_delete(&Id::from(id)).await?;
            if confirm {
                directory.delete(confirmation).await?;
            } else {
                directory.cancel_delete();
                eprintln!("Not deleted. Pass --confirm to delete.");
            }
        }

        Commands::Books => print_json(&state.book_catalog().list().await?)?,
        Commands::BookSave {
            id,
            shelf_code,
            title,
            author,
            publisher,
            year,
            stock,
            detail,
        } => {
            let catalog = state.book_catalog();
            let form = BookForm {
                shelf_code,
                title,
                author,
                publisher,
                year,
                stock,
                detail,
            };
            match id {
                Some(id) => catalog.update(&Id::from(id), &form).await?,
                None => catalog.create(&form).await?,
            }
        }
        Commands::BookDelete { id, confirm } => {
            let catalog = state.book_catalog();
            catalog.list().await?;
            let confirmation = catalog.request_delete(&Id::from(id)).await?;
            if confirm {
                catalog.delete(confirmation).await?;
            } else {
                catalog.cancel_delete();
                eprintln!("Not deleted. Pass --confirm to delete.");
            }
        }

        Commands::Loans { member } => {
            let loans = state.loan_manager(state.fine_ledger());
            let member = member.map(Id::from);
            print_json(&loans.list_loans(member.as_ref()).await?)?;
        }
        Commands::Borrow {
            member,
            book,
            loan_date,
            due_date,
        } => {
            let loans = state.loan_manager(state.fine_ledger());
            let form = LoanForm {
                member_id: Id::parse(&member),
                book_id: Id::parse(&book),
                loan_date: Some(loan_date),
                due_date: Some(due_date),
            };
            let loan = loans.create_loan(&form).await?;
            print_json(&loan)?;
        }
        Commands::Return { id } => {
            let loans = state.loan_manager(state.fine_ledger());
            loans.list_loans(None).await?;
            let outcome = loans.mark_returned(&Id::from(id)).await?;
            info!(loan = %outcome.loan_id, late_fee = outcome.late_fee, "return processed");
            match outcome.fine {
                FineAssessment::NotLate => println!("Returned on time."),
                FineAssessment::Recorded(fine) => {
                    println!("Returned late. Fine {} of {} recorded.", fine.id, fine.amount);
                }
                FineAssessment::Failed(err) => {
                    println!(
                        "Returned late. A fine of {} could not be recorded: {err}",
                        outcome.late_fee
                    );
                }
            }
        }
        Commands::Chart { year } => {
            let loans = state.api.list_loans().await?;
            let filter = year.map_or(YearFilter::All, YearFilter::Year);
            print_json(&serde_json::json!({
                "years": loan_years(&loans),
                "months": loans_per_month(&loans, filter),
            }))?;
        }

        Commands::Fines { member } => {
            let ledger = state.fine_ledger();
            let rows = ledger.list_fines().await?;
            match member {
                Some(member) => {
                    print_json(&ledger.fine_history_for_member(&Id::from(member)).await)?;
                }
                None => print_json(&rows)?,
            }
        }
        Commands::FineAdd {
            member,
            book,
            amount,
            category,
            description,
        } => {
            let ledger = state.fine_ledger();
            let form = FineForm {
                member_id: Id::parse(&member),
                book_id: book.as_deref().and_then(Id::parse),
                amount,
                category,
                description,
            };
            print_json(&ledger.submit_fine(&form).await?)?;
        }
        Commands::FineDelete { id, confirm } => {
            let ledger = state.fine_ledger();
            ledger.list_fines().await?;
            let confirmation = ledger.request_delete(&Id::from(id)).await?;
            if confirm {
                ledger.delete_fine(confirmation).await?;
            } else {
                ledger.cancel_delete();
                eprintln!("Not deleted. Pass --confirm to delete.");
            }
        }
        Commands::Totals => {
            let ledger = state.fine_ledger();
            ledger.list_fines().await?;
            print_json(&ledger.member_totals().await)?;
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn load_token(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => Ok(Some(raw.trim().to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
    }
}

/// Keep the token file in step with the session; an expired or cleared
/// session removes it.
async fn store_token(path: &Path, token: Option<String>) -> Result<()> {
    match token {
        Some(token) => tokio::fs::write(path, token)
            .await
            .with_context(|| format!("failed to write {}", path.display())),
        None => match tokio::fs::remove_file(path).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                Err(e).with_context(|| format!("failed to remove {}", path.display()))
            }
            _ => Ok(()),
        },
    }
}
