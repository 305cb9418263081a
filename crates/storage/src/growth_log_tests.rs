// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;
use wd_core::MilestoneKind;

#[test]
fn append_assigns_increasing_seq_across_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("growth.jsonl");
    {
        let mut log = GrowthLog::open(&path).unwrap();
        let a = log
            .append(GrowthMilestone::new(MilestoneKind::Boot, "supervisor started", 1))
            .unwrap();
        let b = log
            .append(GrowthMilestone::new(MilestoneKind::Warn, "1 failure", 2))
            .unwrap();
        assert_eq!((a.seq, b.seq), (1, 2));
    }

    let mut log = GrowthLog::open(&path).unwrap();
    assert_eq!(log.len(), 2);
    let c = log
        .append(GrowthMilestone::new(MilestoneKind::Restart, "restarted", 3))
        .unwrap();
    assert_eq!(c.seq, 3);
}

#[test]
fn recent_is_newest_first() {
    let dir = tempdir().unwrap();
    let mut log = GrowthLog::open(&dir.path().join("growth.jsonl")).unwrap();
    assert!(log.is_empty());
    for (i, kind) in [MilestoneKind::Boot, MilestoneKind::Commit, MilestoneKind::StableTag]
        .into_iter()
        .enumerate()
    {
        log.append(GrowthMilestone::new(kind, "", i as u64)).unwrap();
    }
    let recent = log.recent(2);
    assert_eq!(recent[0].kind, MilestoneKind::StableTag);
    assert_eq!(recent[1].kind, MilestoneKind::Commit);
    assert_eq!(log.all()[0].kind, MilestoneKind::Boot);
}
