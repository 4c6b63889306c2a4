mod election_steps;
mod liveness_steps;
mod replication_steps;
