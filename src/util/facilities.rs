use crate::{
    error::{Error, Result},
    strava::ActivitySource,
};

#[derive(PartialEq, Copy, Clone, Debug)]
pub enum Required {
    ActivitySource,
}

/// The collaborators a run may use. Everything is optional so that a
/// cache-only run works without credentials.
pub struct Facilities<'a, S: ActivitySource> {
    activity_source: Option<&'a S>,
}

impl<'a, S: ActivitySource> Facilities<'a, S> {
    pub fn activity_source(&self) -> Result<&'a S> {
        self.activity_source
            .ok_or(Error::MissingDependency("activity source"))
    }

    pub fn optional_activity_source(&self) -> Option<&'a S> {
        self.activity_source
    }

    pub fn check(&self, required: &[Required]) -> Result<()> {
        for depend in required {
            match depend {
                Required::ActivitySource => {
                    self.activity_source()?;
                }
            }
        }

        Ok(())
    }
}

pub struct DependenciesBuilder<'a, S: ActivitySource> {
    dependencies: Facilities<'a, S>,
}

impl<'a, S: ActivitySource> Default for DependenciesBuilder<'a, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, S: ActivitySource> DependenciesBuilder<'a, S> {
    pub fn new() -> Self {
        Self {
            dependencies: Facilities {
                activity_source: None,
            },
        }
    }

    pub fn with_activity_source(mut self, source: Option<&'a S>) -> Self {
        self.dependencies.activity_source = source;
        self
    }

    pub fn build(self) -> Facilities<'a, S> {
        self.dependencies
    }
}
