//! Command-line Options
//!
//! Simulations declare their options as data. The sets contributed along a
//! specialization chain are merged into one [`OptionSet`], which rejects
//! duplicate names and is parsed with a `clap` command built at runtime.

use std::ffi::OsString;

use clap::builder::PossibleValuesParser;
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};
use sim_agents::{Params, Value};

use crate::error::ConfigurationError;

/// Value type of an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Int,
    Float,
    Str,
    /// Boolean switch, false unless given.
    Flag,
    /// Comma-separated or repeated strings.
    List,
}

impl OptionKind {
    fn accepts_default(self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => self != OptionKind::Flag,
            (OptionKind::Int, Value::Int(_)) => true,
            (OptionKind::Float, Value::Float(_) | Value::Int(_)) => true,
            (OptionKind::Str, Value::Str(_)) => true,
            (OptionKind::Flag, Value::Bool(_)) => true,
            (OptionKind::List, Value::List(_)) => true,
            _ => false,
        }
    }
}

/// One declared option: `(short, long, {default, type, dest, help})`.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionSpec {
    pub short: Option<char>,
    pub long: String,
    pub kind: OptionKind,
    pub default: Value,
    /// Parameter name the value is stored under.
    pub dest: String,
    pub help: String,
    pub choices: Vec<String>,
}

impl OptionSpec {
    /// `dest` defaults to `long` with dashes turned into underscores.
    pub fn new(long: impl Into<String>, kind: OptionKind) -> Self {
        let long = long.into();
        Self {
            short: None,
            dest: long.replace('-', "_"),
            long,
            kind,
            default: if kind == OptionKind::Flag {
                Value::Bool(false)
            } else {
                Value::Null
            },
            help: String::new(),
            choices: Vec::new(),
        }
    }

    pub fn int(long: impl Into<String>) -> Self {
        Self::new(long, OptionKind::Int)
    }

    pub fn float(long: impl Into<String>) -> Self {
        Self::new(long, OptionKind::Float)
    }

    pub fn string(long: impl Into<String>) -> Self {
        Self::new(long, OptionKind::Str)
    }

    pub fn flag(long: impl Into<String>) -> Self {
        Self::new(long, OptionKind::Flag)
    }

    pub fn list(long: impl Into<String>) -> Self {
        Self::new(long, OptionKind::List)
    }

    pub fn short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    pub fn default_value(mut self, default: impl Into<Value>) -> Self {
        self.default = default.into();
        self
    }

    pub fn dest(mut self, dest: impl Into<String>) -> Self {
        self.dest = dest.into();
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    fn malformed(&self, reason: impl Into<String>) -> ConfigurationError {
        ConfigurationError::MalformedOption {
            name: self.long.clone(),
            reason: reason.into(),
        }
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        let well_formed = !self.long.is_empty()
            && !self.long.starts_with('-')
            && self
                .long
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !well_formed {
            return Err(self.malformed("long names use letters, digits and inner dashes"));
        }
        if self.dest.is_empty() {
            return Err(self.malformed("empty destination"));
        }
        if self.long == "help" || self.short == Some('h') {
            return Err(self.malformed("help is reserved"));
        }
        if let Some(short) = self.short {
            if !short.is_ascii_alphanumeric() {
                return Err(self.malformed(format!("invalid short flag '{short}'")));
            }
        }
        if !self.kind.accepts_default(&self.default) {
            return Err(self.malformed(format!(
                "default {} does not match {:?}",
                self.default, self.kind
            )));
        }
        if !self.choices.is_empty() {
            if self.kind != OptionKind::Str {
                return Err(self.malformed("choices only apply to string options"));
            }
            if let Value::Str(default) = &self.default {
                if !self.choices.contains(default) {
                    return Err(self.malformed(format!("default '{default}' is not a choice")));
                }
            }
        }
        Ok(())
    }

    fn to_arg(&self) -> Arg {
        let mut help = self.help.clone();
        if !matches!(self.default, Value::Null | Value::Bool(false)) {
            help.push_str(&format!(" [default: {}]", self.default));
        }
        let mut arg = Arg::new(self.dest.clone())
            .long(self.long.clone())
            .help(help);
        if let Some(short) = self.short {
            arg = arg.short(short);
        }
        match self.kind {
            OptionKind::Int => arg
                .action(ArgAction::Set)
                .value_name("N")
                .value_parser(clap::value_parser!(i64)),
            OptionKind::Float => arg
                .action(ArgAction::Set)
                .value_name("X")
                .value_parser(clap::value_parser!(f64)),
            OptionKind::Str if self.choices.is_empty() => arg
                .action(ArgAction::Set)
                .value_name("VALUE")
                .value_parser(clap::value_parser!(String)),
            OptionKind::Str => arg
                .action(ArgAction::Set)
                .value_parser(PossibleValuesParser::new(self.choices.clone())),
            OptionKind::Flag => arg.action(ArgAction::SetTrue),
            OptionKind::List => arg
                .action(ArgAction::Append)
                .value_delimiter(',')
                .value_name("ITEM")
                .value_parser(clap::value_parser!(String)),
        }
    }

    /// Value given on the command line, if any.
    fn read(&self, matches: &ArgMatches) -> Option<Value> {
        if matches.value_source(&self.dest) != Some(ValueSource::CommandLine) {
            return None;
        }
        match self.kind {
            OptionKind::Int => matches.get_one::<i64>(&self.dest).map(|v| Value::Int(*v)),
            OptionKind::Float => matches.get_one::<f64>(&self.dest).map(|v| Value::Float(*v)),
            OptionKind::Str => matches
                .get_one::<String>(&self.dest)
                .map(|v| Value::Str(v.clone())),
            OptionKind::Flag => Some(Value::Bool(matches.get_flag(&self.dest))),
            OptionKind::List => matches
                .get_many::<String>(&self.dest)
                .map(|items| Value::List(items.map(|s| Value::Str(s.clone())).collect())),
        }
    }
}

/// Ordered, duplicate-free collection of options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionSet {
    specs: Vec<OptionSpec>,
}

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_specs(specs: impl IntoIterator<Item = OptionSpec>) -> Result<Self, ConfigurationError> {
        let mut set = Self::new();
        for spec in specs {
            set.add(spec)?;
        }
        Ok(set)
    }

    /// Adds an option, refusing a long name, short flag, or destination that
    /// is already taken.
    pub fn add(&mut self, spec: OptionSpec) -> Result<(), ConfigurationError> {
        spec.validate()?;
        let clash = self.specs.iter().find(|existing| {
            existing.long == spec.long
                || existing.dest == spec.dest
                || (spec.short.is_some() && existing.short == spec.short)
        });
        if clash.is_some() {
            return Err(ConfigurationError::DuplicateOption(spec.long));
        }
        self.specs.push(spec);
        Ok(())
    }

    /// Appends every option of `other`.
    pub fn extend(&mut self, other: &OptionSet) -> Result<(), ConfigurationError> {
        for spec in &other.specs {
            self.add(spec.clone())?;
        }
        Ok(())
    }

    pub fn get(&self, dest: &str) -> Option<&OptionSpec> {
        self.specs.iter().find(|spec| spec.dest == dest)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OptionSpec> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Declared defaults, keyed by destination. Options without a default
    /// are left out.
    pub fn defaults(&self) -> Params {
        self.specs
            .iter()
            .filter(|spec| !spec.default.is_null())
            .map(|spec| (spec.dest.clone(), spec.default.clone()))
            .collect()
    }

    pub fn command(&self, name: &str) -> Command {
        Command::new(name.to_string())
            .args(self.specs.iter().map(OptionSpec::to_arg))
    }

    /// Parses `args` (program name first) and returns only the values given
    /// explicitly; defaults are a separate layer.
    pub fn parse_from<I, T>(&self, name: &str, args: I) -> Result<Params, ConfigurationError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = self.command(name).try_get_matches_from(args)?;
        Ok(self
            .specs
            .iter()
            .filter_map(|spec| spec.read(&matches).map(|v| (spec.dest.clone(), v)))
            .collect())
    }

    /// Options every simulation understands.
    pub fn baseline() -> Self {
        let specs = [
            OptionSpec::int("steps")
                .short('s')
                .default_value(100)
                .help("Number of ticks before the count-down terminates the run"),
            OptionSpec::int("seed")
                .default_value(42)
                .help("Random seed for reproducibility"),
            OptionSpec::string("config")
                .short('c')
                .help("TOML file with parameter values"),
            OptionSpec::string("graph-type")
                .choices(["sparse", "dense", "directed-sparse", "directed-dense"])
                .default_value("sparse")
                .help("Graph back-end"),
            OptionSpec::int("max-nodes")
                .default_value(10_000)
                .help("Capacity of dense back-ends"),
            OptionSpec::string("serializer")
                .choices(["bincode", "json"])
                .default_value("bincode")
                .help("Encoding of evicted agents"),
            OptionSpec::flag("sync-activator")
                .help("Wait for every activation before the next one"),
            OptionSpec::flag("pipelined")
                .help("Fire ticks without consulting the termination checker"),
            OptionSpec::int("network-size")
                .short('n')
                .dest("starting_network_size")
                .default_value(100)
                .help("Size of the starting population"),
            OptionSpec::string("log-file").help("Write the simulation log to a file"),
            OptionSpec::flag("quiet").short('q').help("Discard the simulation log"),
        ];
        let mut set = Self::new();
        for spec in specs {
            set.specs.push(spec);
        }
        set
    }
}
