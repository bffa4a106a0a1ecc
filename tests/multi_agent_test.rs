// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Shahzad A. Bhatti <bhatti@plexobject.com>
//
// This file is part of AgentSpaces.
//
// AgentSpaces is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// AgentSpaces is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with AgentSpaces. If not, see <https://www.gnu.org/licenses/>.

//! End-to-end tests with several agents sharing one space
//!
//! ## Purpose
//! Verifies that mutations propagate between agents through the action
//! stream, that the store arbitrates competing removals, and that an agent
//! never applies its own echoes twice.

mod common;

use agentspaces::prelude::*;
use common::{agents_on, eventually};
use std::sync::Arc;
use std::time::Duration;

/// Test 1: a write by one agent shows up in the other agent's mirror
#[tokio::test]
async fn test_foreign_writes_propagate() {
    let store = Arc::new(MemorySpaceStore::<I32Tuple>::new("shared"));
    let agents = agents_on(&store, 2);
    let (writer, reader) = (&agents[0], &agents[1]);

    reader.initialize().await.unwrap();
    writer.write(I32Tuple::from([1, 2, 3])).await.unwrap();

    let probe = reader.clone();
    eventually(move || {
        let reader = probe.clone();
        async move { reader.count().await.unwrap() == 1 }
    })
    .await;
    assert_eq!(
        reader.peek(I32Template::wildcards(3)).await.unwrap(),
        I32Tuple::from([1, 2, 3])
    );
    assert_eq!(reader.stats().await.foreign_inserts, 1);
}

/// Test 2: own echoes are not applied twice
#[tokio::test]
async fn test_own_echo_not_double_applied() {
    let store = Arc::new(MemorySpaceStore::<I32Tuple>::new("echo"));
    let agents = agents_on(&store, 1);
    let agent = &agents[0];

    agent.write(I32Tuple::from([1])).await.unwrap();
    agent.write(I32Tuple::from([2])).await.unwrap();

    let probe = agent.clone();
    eventually(move || {
        let agent = probe.clone();
        async move { agent.stats().await.echoes_skipped == 2 }
    })
    .await;
    assert_eq!(agent.count().await.unwrap(), 2);
}

/// Test 3: two agents popping the same tuple; exactly one wins
#[tokio::test]
async fn test_concurrent_pops_one_winner() {
    for round in 0..10 {
        let store = Arc::new(MemorySpaceStore::<I32Tuple>::new(format!("race-{}", round)));
        let agents = agents_on(&store, 2);
        for agent in &agents {
            agent.initialize().await.unwrap();
        }

        agents[0].write(I32Tuple::from([round])).await.unwrap();
        let probe = agents[1].clone();
        eventually(move || {
            let agent = probe.clone();
            async move { agent.count().await.unwrap() == 1 }
        })
        .await;

        let (a, b) = (agents[0].clone(), agents[1].clone());
        let template = I32Template::wildcards(1);
        let (ta, tb) = tokio::join!(a.pop(template.clone()), b.pop(template.clone()));
        let (ta, tb) = (ta.unwrap(), tb.unwrap());

        assert!(
            ta.is_empty() != tb.is_empty(),
            "round {}: expected exactly one winner, got {} and {}",
            round,
            ta,
            tb
        );
        assert!(store.is_empty().await);
    }
}

/// Test 4: a pop waiting on one agent is satisfied by another agent's write
#[tokio::test]
async fn test_cross_agent_pop_wait() {
    let store = Arc::new(MemorySpaceStore::<I32Tuple>::new("wait"));
    let agents = agents_on(&store, 2);
    let (producer, consumer) = (agents[0].clone(), agents[1].clone());

    let waiting = tokio::spawn(async move {
        consumer
            .pop_wait(I32Template::from(vec![Some(7), None]), Some(Duration::from_secs(5)))
            .await
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    producer.write(I32Tuple::from([7, 8])).await.unwrap();

    let taken = waiting.await.unwrap().unwrap();
    assert_eq!(taken, I32Tuple::from([7, 8]));

    eventually(move || {
        let producer = producer.clone();
        async move { producer.count().await.unwrap() == 0 }
    })
    .await;
    assert!(store.is_empty().await);
}

/// Test 5: removing waiters on different agents compete for one tuple
#[tokio::test]
async fn test_competing_pop_waiters() {
    let store = Arc::new(MemorySpaceStore::<I32Tuple>::new("compete"));
    let agents = agents_on(&store, 3);

    let mut waiters = Vec::new();
    for agent in &agents[1..] {
        let agent = agent.clone();
        waiters.push(tokio::spawn(async move {
            agent
                .pop_wait(I32Template::wildcards(1), Some(Duration::from_millis(500)))
                .await
                .unwrap()
        }));
    }

    tokio::time::sleep(Duration::from_millis(20)).await;
    agents[0].write(I32Tuple::from([1])).await.unwrap();

    let mut winners = 0;
    for waiter in waiters {
        if !waiter.await.unwrap().is_empty() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
    assert!(store.is_empty().await);
}

/// Test 6: clear by one agent empties every mirror
#[tokio::test]
async fn test_clear_propagates() {
    let store = Arc::new(MemorySpaceStore::<SpaceTuple>::new("clear"));
    let agents = agents_on(&store, 2);
    agents[1].initialize().await.unwrap();

    agents[0].write(space_tuple!["a", 1i32]).await.unwrap();
    agents[0].write(space_tuple!["b", 2i32]).await.unwrap();

    let probe = agents[1].clone();
    eventually(move || {
        let agent = probe.clone();
        async move { agent.count().await.unwrap() == 2 }
    })
    .await;

    agents[0].clear().await.unwrap();
    let probe = agents[1].clone();
    eventually(move || {
        let agent = probe.clone();
        async move { agent.count().await.unwrap() == 0 }
    })
    .await;
}

/// Test 7: a late agent sees the snapshot, then live updates
#[tokio::test]
async fn test_late_joiner_snapshot() {
    let store = Arc::new(MemorySpaceStore::<SpaceTuple>::new("late"));
    let early = agents_on(&store, 1).remove(0);
    early.write(space_tuple!["job", 1i32]).await.unwrap();

    let late = agents_on(&store, 1).remove(0);
    let jobs = late
        .scan(space_template!["job", FieldKind::I32])
        .await
        .unwrap();
    assert_eq!(jobs, vec![space_tuple!["job", 1i32]]);

    early.write(space_tuple!["job", 2i32]).await.unwrap();
    let probe = late.clone();
    eventually(move || {
        let late = probe.clone();
        async move {
            late.count_matching(space_template!["job", SpaceUnit])
                .await
                .unwrap()
                == 2
        }
    })
    .await;
}
