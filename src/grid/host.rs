use crate::grid::job::Job;
use crate::grid::resource::ResourceList;
use serde::{Deserialize, Serialize};

/// One `Queue-List` entry: a queue instance on a host, its resources and the
/// jobs running there
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct Host {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub qtype: String,
    #[serde(default)]
    pub slots_used: i32,
    #[serde(rename(deserialize = "slots_resv", serialize = "slots_reserved"), default)]
    pub slots_reserved: i32,
    #[serde(default)]
    pub slots_total: i32,
    #[serde(rename(deserialize = "load_avg", serialize = "load_average"), default)]
    pub load_average: f64,
    #[serde(rename(deserialize = "resource", serialize = "resources"), default)]
    pub resources: ResourceList,
    #[serde(default)]
    pub job_list: Vec<Job>,
}

impl Host {
    /// Host part of a `queue@host` name
    pub fn hostname(&self) -> &str {
        self.name
            .split_once('@')
            .map(|(_, host)| host)
            .unwrap_or(&self.name)
    }

    /// Queue part of a `queue@host` name
    pub fn queue(&self) -> &str {
        self.name
            .split_once('@')
            .map(|(queue, _)| queue)
            .unwrap_or(&self.name)
    }
}

/// Scheduled queue instances
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct QueueInfo {
    #[serde(rename(deserialize = "Queue-List", serialize = "queue_list"), default)]
    pub queues: Vec<Host>,
}

/// Jobs not yet scheduled onto a host
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct PendingJobs {
    #[serde(default)]
    pub job_list: Vec<Job>,
}
