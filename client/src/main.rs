//! Minimal CLI front-end for the distributed file service (spec §9,
//! "informative, not core"). This is the thin command parser the real
//! interactive editor would sit behind — it is not that editor.

use clap::{Parser, Subcommand};
use client::api::{NmConn, SsConn};
use client::config::{load_config, Config};
use client::error::ClientError;
use protocol::header::OpCode;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "client", about = "CLI front-end for the distributed file service")]
struct Cli {
    #[arg(long, default_value = "client.toml")]
    config: PathBuf,

    #[arg(long)]
    nm_addr: Option<SocketAddr>,

    /// Username to present to NM/SS. No stronger auth is required (spec §1).
    #[arg(long, default_value = "anonymous")]
    user: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Namespace operations: create, delete, info, move.
    #[command(subcommand)]
    File(FileCmd),
    /// Data-path operations against a file's body.
    #[command(subcommand)]
    Edit(EditCmd),
    /// Folder tree operations.
    #[command(subcommand)]
    Folder(FolderCmd),
    /// Checkpoint operations.
    #[command(subcommand)]
    Version(VersionCmd),
    /// ACL and access-request operations.
    #[command(subcommand)]
    Access(AccessCmd),
    /// Registered-username listings.
    #[command(subcommand)]
    User(UserCmd),
}

#[derive(Subcommand, Debug)]
enum FileCmd {
    Create { folder: String, name: String },
    Delete { folder: String, name: String },
    Info { folder: String, name: String },
    Move { folder: String, name: String, dest: String },
    List {
        #[arg(short = 'a', long)]
        all: bool,
        #[arg(short = 'l', long)]
        long: bool,
    },
}

#[derive(Subcommand, Debug)]
enum EditCmd {
    Read { folder: String, name: String },
    Lock { folder: String, name: String, sentence: i32 },
    Write {
        folder: String,
        name: String,
        sentence: i32,
        word: i32,
        content: String,
    },
    Unlock { folder: String, name: String, sentence: i32 },
    Undo { folder: String, name: String },
    Stream { folder: String, name: String },
    Exec { folder: String, name: String },
}

#[derive(Subcommand, Debug)]
enum FolderCmd {
    Create { path: String },
    View { path: String },
}

#[derive(Subcommand, Debug)]
enum VersionCmd {
    Checkpoint { folder: String, name: String, tag: String },
    View { folder: String, name: String, tag: String },
    Revert { folder: String, name: String, tag: String },
    List { folder: String, name: String },
}

#[derive(Subcommand, Debug)]
enum AccessCmd {
    Grant {
        folder: String,
        name: String,
        target: String,
        #[arg(short = 'R', long)]
        read: bool,
        #[arg(short = 'W', long)]
        write: bool,
    },
    Revoke { folder: String, name: String, target: String },
    Request {
        folder: String,
        name: String,
        #[arg(short = 'R', long)]
        read: bool,
        #[arg(short = 'W', long)]
        write: bool,
    },
    View { folder: String, name: String },
    Approve { folder: String, name: String, target: String },
    Deny { folder: String, name: String, target: String },
}

#[derive(Subcommand, Debug)]
enum UserCmd {
    /// `list users` (spec §4.2) — registered usernames, not files.
    List,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "client=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config: Config = load_config(&cli.config);
    if let Some(addr) = cli.nm_addr {
        config.nm_addr = addr;
    }

    match run(config, &cli.user, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config, user: &str, command: Command) -> Result<(), ClientError> {
    let mut nm = NmConn::connect(config.nm_addr, user).await?;

    match command {
        Command::File(cmd) => run_file(&mut nm, cmd).await,
        Command::Folder(cmd) => run_folder(&mut nm, cmd).await,
        Command::Version(cmd) => run_version(&mut nm, cmd).await,
        Command::Access(cmd) => run_access(&mut nm, cmd).await,
        Command::User(cmd) => run_user(&mut nm, cmd).await,
        Command::Edit(cmd) => run_edit(&mut nm, user, cmd).await,
    }
}

async fn run_file(nm: &mut NmConn, cmd: FileCmd) -> Result<(), ClientError> {
    match cmd {
        FileCmd::Create { folder, name } => nm.create_file(&folder, &name).await,
        FileCmd::Delete { folder, name } => nm.delete_file(&folder, &name).await,
        FileCmd::Info { folder, name } => {
            println!("{}", nm.info(&folder, &name).await?);
            Ok(())
        }
        FileCmd::Move { folder, name, dest } => nm.move_file(&folder, &name, &dest).await,
        FileCmd::List { all, long } => {
            for entry in nm.list_files(all, long).await? {
                println!("{entry}");
            }
            Ok(())
        }
    }
}

async fn run_folder(nm: &mut NmConn, cmd: FolderCmd) -> Result<(), ClientError> {
    match cmd {
        FolderCmd::Create { path } => nm.create_folder(&path).await,
        FolderCmd::View { path } => {
            for entry in nm.view_folder(&path).await? {
                println!("{entry}");
            }
            Ok(())
        }
    }
}

async fn run_version(nm: &mut NmConn, cmd: VersionCmd) -> Result<(), ClientError> {
    match cmd {
        VersionCmd::Checkpoint { folder, name, tag } => nm.checkpoint(&folder, &name, &tag).await,
        VersionCmd::View { folder, name, tag } => {
            println!("{}", nm.view_checkpoint(&folder, &name, &tag).await?);
            Ok(())
        }
        VersionCmd::Revert { folder, name, tag } => nm.revert(&folder, &name, &tag).await,
        VersionCmd::List { folder, name } => {
            for entry in nm.list_checkpoints(&folder, &name).await? {
                println!("{entry}");
            }
            Ok(())
        }
    }
}

async fn run_access(nm: &mut NmConn, cmd: AccessCmd) -> Result<(), ClientError> {
    match cmd {
        AccessCmd::Grant { folder, name, target, read, write } => {
            nm.grant_access(&folder, &name, &target, read, write).await
        }
        AccessCmd::Revoke { folder, name, target } => nm.revoke_access(&folder, &name, &target).await,
        AccessCmd::Request { folder, name, read, write } => {
            match nm.request_access(&folder, &name, read, write).await {
                Ok(()) => Ok(()),
                Err(ClientError::AlreadyHasAccess(_, r, w)) => {
                    println!("already has access: read={r} write={w}");
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
        AccessCmd::View { folder, name } => {
            for entry in nm.view_requests(&folder, &name).await? {
                println!("{entry}");
            }
            Ok(())
        }
        AccessCmd::Approve { folder, name, target } => nm.approve_request(&folder, &name, &target).await,
        AccessCmd::Deny { folder, name, target } => nm.deny_request(&folder, &name, &target).await,
    }
}

async fn run_user(nm: &mut NmConn, cmd: UserCmd) -> Result<(), ClientError> {
    match cmd {
        UserCmd::List => {
            for entry in nm.list_users().await? {
                println!("{entry}");
            }
            Ok(())
        }
    }
}

async fn run_edit(nm: &mut NmConn, user: &str, cmd: EditCmd) -> Result<(), ClientError> {
    match cmd {
        EditCmd::Read { folder, name } => {
            let addr = nm.locate(&folder, &name, OpCode::Read).await?;
            let mut ss = SsConn::connect(addr, user).await?;
            println!("{}", ss.read(&folder, &name).await?);
            Ok(())
        }
        EditCmd::Lock { folder, name, sentence } => {
            let addr = nm.locate(&folder, &name, OpCode::Write).await?;
            let mut ss = SsConn::connect(addr, user).await?;
            ss.write_lock(&folder, &name, sentence).await
        }
        EditCmd::Write { folder, name, sentence, word, content } => {
            let addr = nm.locate(&folder, &name, OpCode::Write).await?;
            let mut ss = SsConn::connect(addr, user).await?;
            ss.write_word(&folder, &name, sentence, word, &content).await
        }
        EditCmd::Unlock { folder, name, sentence } => {
            let addr = nm.locate(&folder, &name, OpCode::Write).await?;
            let mut ss = SsConn::connect(addr, user).await?;
            ss.write_unlock(&folder, &name, sentence).await
        }
        EditCmd::Undo { folder, name } => {
            let addr = nm.locate(&folder, &name, OpCode::Undo).await?;
            let mut ss = SsConn::connect(addr, user).await?;
            ss.undo(&folder, &name).await
        }
        EditCmd::Stream { folder, name } => {
            let addr = nm.locate(&folder, &name, OpCode::Stream).await?;
            let mut ss = SsConn::connect(addr, user).await?;
            for word in ss.stream(&folder, &name).await? {
                println!("{word}");
            }
            Ok(())
        }
        EditCmd::Exec { folder, name } => {
            let addr = nm.locate(&folder, &name, OpCode::Exec).await?;
            let mut ss = SsConn::connect(addr, user).await?;
            let output = ss.exec(&folder, &name).await?;
            print!("{}", String::from_utf8_lossy(&output));
            Ok(())
        }
    }
}
