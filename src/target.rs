use std::fmt;
use std::str::FromStr;

use regex::Regex;

use crate::error::Error;
use crate::error::Result;
use crate::project::ProjectId;

/// Scratch username, restricted to the characters the site allows so it can
/// be used as a directory name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Username(String);

impl Username {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Username {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let valid = !s.is_empty()
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if valid {
            Ok(Self(s.to_owned()))
        } else {
            Err(Error::InvalidUsername(s.to_owned()))
        }
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a command-line URL points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    User(Username),
    Project(ProjectId),
    Studio(u64),
}

pub fn parse_target(url: &str) -> Result<Target> {
    let url = url.trim();

    // A bare number is a project id.
    if let Ok(id) = url.parse::<u64>() {
        return Ok(Target::Project(ProjectId::new(id)));
    }

    let user_re = Regex::new(r"(?i)scratch\.mit\.edu/users/([^/?#]+)")?;
    if let Some(caps) = user_re.captures(url) {
        return Ok(Target::User(caps[1].parse()?));
    }

    let project_re = Regex::new(r"(?i)scratch\.mit\.edu/projects/([0-9]+)")?;
    if let Some(caps) = project_re.captures(url) {
        return Ok(Target::Project(caps[1].parse()?));
    }

    let studio_re = Regex::new(r"(?i)scratch\.mit\.edu/studios/([0-9]+)")?;
    if let Some(caps) = studio_re.captures(url) {
        let id = caps[1]
            .parse()
            .map_err(|_| Error::UnrecognizedUrl(url.to_owned()))?;
        return Ok(Target::Studio(id));
    }

    Err(Error::UnrecognizedUrl(url.to_owned()))
}
