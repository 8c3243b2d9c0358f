use std::time::Duration;

use alloy_primitives::{Address, B256, U256};
use metrics::{counter, histogram};
use tracing::{info, warn};

use super::metrics::prometheus_enabled;
use crate::feed::EventKind;
use crate::pipeline::{ActionKind, PipelinePhase};
use crate::quote::QuoteDirection;
use crate::session::ConnectionState;

pub fn session_transition(from: ConnectionState, to: ConnectionState) {
    info!(
        target: "monitoring::session",
        event = "transition",
        from = from.as_str(),
        to = to.as_str(),
        "session state changed"
    );

    if prometheus_enabled() {
        counter!("poolside_session_transition_total", "to" => to.as_str()).increment(1);
    }
}

pub fn session_connected(account: &Address, chain_id: u64, correct_network: bool) {
    info!(
        target: "monitoring::session",
        event = "connected",
        account = %account,
        chain_id,
        correct_network,
        "wallet connected"
    );
}

pub fn network_switch(target_chain: u64, outcome: &'static str) {
    info!(
        target: "monitoring::session",
        event = "network_switch",
        target_chain,
        outcome,
        "network switch finished"
    );

    if prometheus_enabled() {
        counter!("poolside_network_switch_total", "outcome" => outcome).increment(1);
    }
}

pub fn approval_submitted(kind: ActionKind, token: &Address, amount: U256, tx: &B256) {
    info!(
        target: "monitoring::pipeline",
        event = "approval_submitted",
        action = kind.as_str(),
        token = %token,
        amount = %amount,
        tx = %tx,
        "approval submitted"
    );

    if prometheus_enabled() {
        counter!("poolside_approval_total", "action" => kind.as_str()).increment(1);
    }
}

pub fn pipeline_finished(kind: ActionKind, phase: PipelinePhase, elapsed: Duration) {
    let outcome = match phase {
        PipelinePhase::Confirmed => "confirmed",
        _ => "failed",
    };
    if matches!(phase, PipelinePhase::Confirmed) {
        info!(
            target: "monitoring::pipeline",
            event = "finished",
            action = kind.as_str(),
            outcome,
            elapsed_ms = elapsed.as_millis() as u64,
            "pipeline run finished"
        );
    } else {
        warn!(
            target: "monitoring::pipeline",
            event = "finished",
            action = kind.as_str(),
            outcome,
            elapsed_ms = elapsed.as_millis() as u64,
            "pipeline run failed"
        );
    }

    if prometheus_enabled() {
        counter!(
            "poolside_pipeline_run_total",
            "action" => kind.as_str(),
            "outcome" => outcome
        )
        .increment(1);
        histogram!("poolside_pipeline_run_ms", "action" => kind.as_str())
            .record(elapsed.as_millis() as f64);
    }
}

pub fn quote_outcome(direction: QuoteDirection, outcome: &'static str, attempts: u32) {
    info!(
        target: "monitoring::quote",
        event = "quote",
        direction = direction.as_str(),
        outcome,
        attempts,
        "quote evaluated"
    );

    if prometheus_enabled() {
        counter!(
            "poolside_quote_total",
            "direction" => direction.as_str(),
            "outcome" => outcome
        )
        .increment(1);
    }
}

pub fn feed_history_loaded(from_block: u64, to_block: u64, mints: usize, swaps: usize) {
    info!(
        target: "monitoring::feed",
        event = "history",
        from_block,
        to_block,
        mints,
        swaps,
        "historical events loaded"
    );

    if prometheus_enabled() {
        counter!("poolside_feed_history_total", "outcome" => "ok").increment(1);
    }
}

pub fn feed_history_failed(error: &str) {
    warn!(
        target: "monitoring::feed",
        event = "history",
        error,
        "historical event load failed, keeping previous entries"
    );

    if prometheus_enabled() {
        counter!("poolside_feed_history_total", "outcome" => "error").increment(1);
    }
}

pub fn feed_live_event(kind: EventKind, block_number: u64, inserted: bool) {
    info!(
        target: "monitoring::feed",
        event = "live",
        kind = kind.as_str(),
        block_number,
        inserted,
        "live event observed"
    );

    if prometheus_enabled() {
        counter!("poolside_feed_live_total", "kind" => kind.as_str()).increment(1);
    }
}

pub fn feed_subscription_lost(error: &str) {
    warn!(
        target: "monitoring::feed",
        event = "subscription_lost",
        error,
        "live event subscription lost"
    );

    if prometheus_enabled() {
        counter!("poolside_feed_subscription_lost_total").increment(1);
    }
}
