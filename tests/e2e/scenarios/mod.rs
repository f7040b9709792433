mod hierarchy;
mod reconciliation;
