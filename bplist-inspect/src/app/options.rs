use std::path::PathBuf;

use clap::{crate_version, value_parser, Arg, ArgAction, ArgMatches, Command};

use crate::app::error::RuntimeError;

/// Option names
pub const OPTION_PATH: &str = "path";
pub const OPTION_OFFSET: &str = "offset";
pub const OPTION_LENGTH: &str = "length";
pub const OPTION_VERIFY: &str = "verify";

/// Other CLI text
pub const ABOUT: &str = concat!(
    "The `bplist-inspect` binary checks that a file holds a binary property list, decodes it,\n",
    "and prints the layout described by its trailer."
);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// The file that contains the property list
    pub path: PathBuf,
    /// Where the property list starts inside the file
    pub byte_offset: usize,
    /// How many bytes the property list spans, if it does not run to the end of the file
    pub byte_length: Option<usize>,
    /// If true, re-encode the decoded graph and check that it decodes to the same graph
    pub verify: bool,
}

impl Options {
    pub fn from_args(args: &ArgMatches) -> Result<Self, RuntimeError> {
        let path: &PathBuf = args
            .get_one(OPTION_PATH)
            .ok_or(RuntimeError::InvalidOptions(format!(
                "No file provided, pass the path to a binary property list as `{OPTION_PATH}`"
            )))?;
        let byte_offset: usize = args.get_one(OPTION_OFFSET).copied().unwrap_or(0);
        let byte_length: Option<usize> = args.get_one(OPTION_LENGTH).copied();
        let verify = args.get_flag(OPTION_VERIFY);

        if byte_length == Some(0) {
            return Err(RuntimeError::InvalidOptions(format!(
                "Option --{OPTION_LENGTH} must be greater than zero"
            )));
        }

        Ok(Options {
            path: path.clone(),
            byte_offset,
            byte_length,
            verify,
        })
    }
}

/// Build the command line argument parser
pub fn get_command() -> Command {
    Command::new("bplist-inspect")
        .version(crate_version!())
        .about(ABOUT)
        .arg_required_else_help(true)
        .arg(
            Arg::new(OPTION_PATH)
                .help("Path to the file that contains the binary property list")
                .required(true)
                .value_name("PATH")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new(OPTION_OFFSET)
                .short('o')
                .long(OPTION_OFFSET)
                .help("Byte offset where the property list starts inside the file\n")
                .value_name("BYTES")
                .value_parser(value_parser!(usize))
                .default_value("0"),
        )
        .arg(
            Arg::new(OPTION_LENGTH)
                .short('l')
                .long(OPTION_LENGTH)
                .help("Number of bytes the property list spans\nIf omitted, the property list runs to the end of the file\n")
                .value_name("BYTES")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new(OPTION_VERIFY)
                .short('v')
                .long(OPTION_VERIFY)
                .help("Re-encode the decoded graph and check that it decodes to an equal graph\n")
                .action(ArgAction::SetTrue),
        )
}

#[cfg(test)]
mod arg_tests {
    use std::path::PathBuf;

    use crate::app::{
        error::RuntimeError,
        options::{get_command, Options},
    };

    fn parse(args: &[&str]) -> Result<Options, RuntimeError> {
        let command = get_command();
        let matches = command
            .try_get_matches_from(std::iter::once("bplist-inspect").chain(args.iter().copied()))
            .unwrap();
        Options::from_args(&matches)
    }

    #[test]
    fn can_parse_defaults() {
        let options = parse(&["file.plist"]).unwrap();
        assert_eq!(
            options,
            Options {
                path: PathBuf::from("file.plist"),
                byte_offset: 0,
                byte_length: None,
                verify: false,
            }
        );
    }

    #[test]
    fn can_parse_all() {
        let options = parse(&["file.bin", "--offset", "16", "--length", "200", "--verify"]).unwrap();
        assert_eq!(options.byte_offset, 16);
        assert_eq!(options.byte_length, Some(200));
        assert!(options.verify);
    }

    #[test]
    fn cant_parse_unknown_option() {
        let command = get_command();
        assert!(command
            .try_get_matches_from(["bplist-inspect", "file.plist", "--format", "json"])
            .is_err());
    }

    #[test]
    fn cant_parse_zero_length() {
        assert!(matches!(
            parse(&["file.plist", "-l", "0"]),
            Err(RuntimeError::InvalidOptions(_))
        ));
    }

    #[test]
    fn cant_parse_negative_offset() {
        let command = get_command();
        assert!(command
            .try_get_matches_from(["bplist-inspect", "file.plist", "-o", "-3"])
            .is_err());
    }
}
