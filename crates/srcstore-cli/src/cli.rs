use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "source-store",
    about = "Content-addressed store for program source files",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log debug events to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create an empty repository
    Init(InitArgs),
    /// Copy source files into the default repository
    #[command(name = "add_source_file")]
    AddSourceFile(AddSourceFileArgs),
    /// Print the MD5 digest of each file
    Md5sum(Md5sumArgs),
    /// List the source files recorded in an executable's debug information
    #[command(name = "list_source_files")]
    ListSourceFiles(ListSourceFilesArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Repository root (defaults to $XDG_CACHE_HOME/source-store)
    pub root: Option<PathBuf>,
}

#[derive(Args)]
pub struct AddSourceFileArgs {
    pub paths: Vec<PathBuf>,

    /// fsync every object before publishing it
    #[arg(long)]
    pub fsync: bool,
}

#[derive(Args)]
pub struct Md5sumArgs {
    pub paths: Vec<PathBuf>,
}

#[derive(Args)]
pub struct ListSourceFilesArgs {
    pub executables: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::try_parse_from(["source-store", "init"]).unwrap();
        if let Command::Init(args) = cli.command {
            assert!(args.root.is_none());
        } else {
            panic!("wrong command");
        }

        let cli = Cli::try_parse_from(["source-store", "init", "/tmp/R"]).unwrap();
        if let Command::Init(args) = cli.command {
            assert_eq!(args.root, Some(PathBuf::from("/tmp/R")));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_add_source_file() {
        let cli = Cli::try_parse_from(["source-store", "add_source_file", "a.c", "b.c"]).unwrap();
        if let Command::AddSourceFile(args) = cli.command {
            assert_eq!(args.paths, vec![PathBuf::from("a.c"), PathBuf::from("b.c")]);
            assert!(!args.fsync);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_add_source_file_fsync() {
        let cli =
            Cli::try_parse_from(["source-store", "add_source_file", "--fsync", "a.c"]).unwrap();
        if let Command::AddSourceFile(args) = cli.command {
            assert!(args.fsync);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_without_paths() {
        let cli = Cli::try_parse_from(["source-store", "md5sum"]).unwrap();
        if let Command::Md5sum(args) = cli.command {
            assert!(args.paths.is_empty());
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_list_source_files() {
        let cli = Cli::try_parse_from(["source-store", "list_source_files", "a.out"]).unwrap();
        assert!(matches!(cli.command, Command::ListSourceFiles(_)));
    }

    #[test]
    fn kebab_case_names_are_not_accepted() {
        assert!(Cli::try_parse_from(["source-store", "add-source-file", "a.c"]).is_err());
    }

    #[test]
    fn unknown_subcommand() {
        assert!(Cli::try_parse_from(["source-store", "frobnicate"]).is_err());
        assert!(Cli::try_parse_from(["source-store"]).is_err());
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::try_parse_from(["source-store", "--verbose", "init"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn parse_json_format() {
        let cli =
            Cli::try_parse_from(["source-store", "md5sum", "--format", "json", "a.c"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
    }
}
