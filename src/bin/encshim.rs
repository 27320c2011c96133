//! encshim CLI - Drive an external encrypt routine from the command line
//!
//! Loads the routine from a shared library and runs it over files.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use encshim::file_ops;
use encshim::iv::{FileIv, HexIv, IvSource, RandomIv};
use encshim::{Gateway, LibraryTransform};

#[derive(Parser)]
#[command(name = "encshim")]
#[command(version)]
#[command(about = "Run an external two-phase encrypt routine over files.", long_about = None)]
struct Cli {
    /// Shared library exporting the encrypt routine
    #[arg(long, global = true, env = "ENCSHIM_LIBRARY", value_name = "PATH")]
    library: Option<PathBuf>,

    /// Exported symbol name of the routine
    #[arg(long, global = true, default_value = encshim::transform::DEFAULT_SYMBOL)]
    symbol: String,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
#[group(multiple = false)]
struct IvArgs {
    /// Initialization vector as hex
    #[arg(long, value_name = "HEX")]
    iv_hex: Option<String>,

    /// File whose whole contents is the initialization vector
    #[arg(long, value_name = "FILE")]
    iv_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a file (random IV unless one is given)
    #[command(alias = "e")]
    Encrypt {
        /// Path to the file whose contents is to be encrypted
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to the file to write the encrypted bytes to
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        #[command(flatten)]
        iv: IvArgs,
    },

    /// Check that encrypting a file reproduces a known ciphertext,
    /// using the IV at the start of that ciphertext
    #[command(alias = "v")]
    Verify {
        /// Path to the plaintext
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to the known ciphertext
        #[arg(short, long, value_name = "FILE")]
        expected: PathBuf,
    },

    /// Print the output length encrypting a file would produce
    Size {
        /// Path to the plaintext
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        #[command(flatten)]
        iv: IvArgs,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match run(cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn run(cli: Cli) -> encshim::Result<i32> {
    let Some(library) = cli.library else {
        return Err(encshim::EncshimError::with_kind(
            encshim::ErrorCategory::User,
            encshim::ErrorKind::Library,
            "no library given; pass --library or set ENCSHIM_LIBRARY",
        ));
    };
    let gateway = Gateway::new(LibraryTransform::open_symbol(&library, &cli.symbol)?);

    match cli.command {
        Commands::Encrypt { input, output, iv } => {
            let mut source = iv_source(iv);
            let written = file_ops::encrypt_file(&input, &output, &mut *source, &gateway)?;
            println!("{} bytes written to {}", written, output.display());
            Ok(0)
        }
        Commands::Verify { input, expected } => {
            let verification = file_ops::verify_file(&input, &expected, &gateway)?;
            println!("unencrypted len: {}", verification.plaintext_len);
            println!("encrypted len:   {}", verification.expected_len);
            println!("output len:      {}", verification.output_len);
            if verification.matches {
                println!("pass");
                Ok(0)
            } else {
                println!("mismatch");
                Ok(1)
            }
        }
        Commands::Size { input, iv } => {
            let mut source = iv_source(iv);
            let len = file_ops::required_len(&input, &mut *source, &gateway)?;
            println!("{}", len);
            Ok(0)
        }
    }
}

fn iv_source(args: IvArgs) -> Box<dyn IvSource> {
    match (args.iv_hex, args.iv_file) {
        (Some(hex), _) => Box::new(HexIv::new(hex)),
        (None, Some(path)) => Box::new(FileIv::new(path)),
        (None, None) => Box::new(RandomIv),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
