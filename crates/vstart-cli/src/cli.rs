//! CLI argument definitions for `vstart`.
//!
//! Action flags may repeat and interleave; they run in the order written, so
//! the parsed matches are re-ordered by argument index rather than by flag.

use std::str::FromStr;

use clap::{ArgAction, ArgMatches, CommandFactory, FromArgMatches, Parser};
use vstart_engine::{Action, ExecutionPlan, Request, Target, UnknownTarget};

const ACTION_FLAGS: [(&str, Action); 3] = [
    ("start", Action::Start),
    ("stop", Action::Stop),
    ("restart", Action::Restart),
];

fn parse_target(text: &str) -> Result<Target, UnknownTarget> {
    Target::from_str(text)
}

/// Command-line interface for the local blobstore cluster orchestrator.
#[derive(Parser, Debug)]
#[command(
    name = "vstart",
    about = "Starts, stops and restarts a local blobstore cluster",
    after_help = "Targets: all, depends, blobstore, consul, kafka, clustermgr, blobnode, \
                  shardnode, proxy, scheduler, access"
)]
pub(crate) struct Cli {
    /// Starts a service group or composite.
    #[arg(long, value_name = "TARGET", action = ArgAction::Append, value_parser = parse_target)]
    pub(crate) start: Vec<Target>,
    /// Stops a service group or composite in reverse order.
    #[arg(long, value_name = "TARGET", action = ArgAction::Append, value_parser = parse_target)]
    pub(crate) stop: Vec<Target>,
    /// Stops and then starts a service group or composite.
    #[arg(long, value_name = "TARGET", action = ArgAction::Append, value_parser = parse_target)]
    pub(crate) restart: Vec<Target>,
    /// Removes the scratch, log and pid directories after every action ran.
    #[arg(long)]
    pub(crate) rmdir: bool,
}

/// Parsed actions ready for execution.
#[derive(Debug)]
pub(crate) struct Invocation {
    pub(crate) requests: Vec<Request>,
    pub(crate) rmdir: bool,
}

impl Invocation {
    /// Parses `args`, the first of which is the program name.
    pub(crate) fn parse<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = Cli::command().try_get_matches_from(args)?;
        let cli = Cli::from_arg_matches(&matches)?;
        Ok(Self {
            requests: ordered_requests(&matches),
            rmdir: cli.rmdir,
        })
    }

    pub(crate) fn plan(&self) -> ExecutionPlan {
        ExecutionPlan::from_requests(&self.requests)
    }
}

fn ordered_requests(matches: &ArgMatches) -> Vec<Request> {
    let mut indexed: Vec<(usize, Request)> = ACTION_FLAGS
        .iter()
        .flat_map(|&(id, action)| {
            let indices = matches.indices_of(id).into_iter().flatten();
            let targets = matches.get_many::<Target>(id).into_iter().flatten();
            indices
                .zip(targets)
                .map(move |(index, target)| (index, Request::new(action, *target)))
        })
        .collect();
    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, request)| request).collect()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use vstart_engine::{Composite, GroupName};

    use super::*;

    fn parse(args: &[&str]) -> Invocation {
        let mut argv = vec!["vstart"];
        argv.extend_from_slice(args);
        Invocation::parse(argv).expect("arguments should parse")
    }

    #[rstest]
    fn actions_run_in_the_order_written() {
        let invocation = parse(&["--stop", "access", "--start", "depends", "--stop", "kafka"]);
        assert_eq!(
            invocation.requests,
            vec![
                Request::new(Action::Stop, Target::Group(GroupName::Access)),
                Request::new(Action::Start, Target::Composite(Composite::Depends)),
                Request::new(Action::Stop, Target::Group(GroupName::Kafka)),
            ]
        );
        assert!(!invocation.rmdir);
    }

    #[rstest]
    fn rmdir_alone_requests_no_actions() {
        let invocation = parse(&["--rmdir"]);
        assert!(invocation.requests.is_empty());
        assert!(invocation.plan().is_empty());
        assert!(invocation.rmdir);
    }

    #[rstest]
    #[case("all")]
    #[case("blobstore")]
    #[case("clustermgr")]
    #[case("shardnode")]
    fn accepts_every_target_name(#[case] target: &str) {
        assert_eq!(parse(&["--restart", target]).requests.len(), 1);
    }

    #[rstest]
    fn rejects_unknown_targets() {
        let error = Invocation::parse(["vstart", "--start", "metanode"])
            .expect_err("unknown target should fail");
        assert!(error.to_string().contains("unknown service 'metanode'"));
    }

    #[rstest]
    fn equals_syntax_is_accepted() {
        let invocation = parse(&["--start=proxy"]);
        assert_eq!(
            invocation.requests,
            vec![Request::new(Action::Start, Target::Group(GroupName::Proxy))]
        );
    }
}
