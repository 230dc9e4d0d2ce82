use clap::ValueEnum;

use parley_session::OverflowPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliOverflowPolicy {
    RejectNewest,
    DropOldest,
}

impl From<CliOverflowPolicy> for OverflowPolicy {
    fn from(value: CliOverflowPolicy) -> Self {
        match value {
            CliOverflowPolicy::RejectNewest => OverflowPolicy::RejectNewest,
            CliOverflowPolicy::DropOldest => OverflowPolicy::DropOldest,
        }
    }
}
