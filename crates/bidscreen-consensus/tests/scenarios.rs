//! End-to-end merge scenarios over realistic three-run inputs.

use bidscreen_consensus::{MergeError, MergeOptions, merge, reconcile_records};
use bidscreen_core::{
    Deadline, Recommendation, Risk, RiskLevel, Showstopper, StructuredReport, UsageMeta, Verdict,
};

fn run(temperature_tag: &str) -> StructuredReport {
    StructuredReport {
        title: "Fornitura sistema di automazione totale di laboratorio".into(),
        authority: "Azienda Ospedaliera Universitaria".into(),
        city: "Padova".into(),
        country: "Italy".into(),
        tender_type: "bundle".into(),
        verdict: Verdict {
            recommendation: Recommendation::GoWithMitigation,
            score: 50,
            rationale: format!("Run {temperature_tag}: schedule is tight"),
        },
        usage_meta: UsageMeta {
            model: "gpt-4o".into(),
            prompt_tokens: 48_000,
            completion_tokens: 3_000,
            total_tokens: 51_000,
            estimated_cost: 0.15,
            run_count: 1,
            detail_level: "Medium".into(),
            pages_analyzed: 120,
            chars_analyzed: 180_000,
            truncated: false,
        },
        ..StructuredReport::default()
    }
}

fn showstopper(description: &str) -> Showstopper {
    Showstopper {
        id: "S1".into(),
        description: description.into(),
        evidence: "Capitolato tecnico, art. 7".into(),
        document_ref: "p. 23".into(),
        impact: "Cannot comply".into(),
    }
}

fn risk(id: &str, text: &str, score: u32) -> Risk {
    Risk {
        id: id.into(),
        risk_text: text.into(),
        category: "technical".into(),
        level: if score >= 60 { RiskLevel::High } else { RiskLevel::Medium },
        score,
        ..Risk::default()
    }
}

#[test]
fn showstopper_reported_by_two_of_three_runs_is_kept_once() {
    let mut r1 = run("0.1");
    let mut r2 = run("0.4");
    let r3 = run("0.7");
    r1.showstoppers = vec![showstopper(
        "connection to proprietary middleware X not supported",
    )];
    r2.showstoppers = vec![showstopper("middleware X integration not supported")];

    let groups = reconcile_records(
        &[
            r1.showstoppers.as_slice(),
            r2.showstoppers.as_slice(),
            r3.showstoppers.as_slice(),
        ],
        &MergeOptions::default(),
        1,
    );
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].support, 2);

    let merged = merge(&[r1, r2, r3]).unwrap();
    assert_eq!(merged.showstoppers.len(), 1);
    assert_eq!(
        merged.showstoppers[0].description,
        "connection to proprietary middleware X not supported"
    );
}

#[test]
fn verdict_is_no_go_with_mean_score() {
    let mut r1 = run("0.1");
    let mut r2 = run("0.4");
    let mut r3 = run("0.7");
    r1.verdict.recommendation = Recommendation::Go;
    r1.verdict.score = 20;
    r2.verdict.recommendation = Recommendation::GoWithMitigation;
    r2.verdict.score = 50;
    r3.verdict.recommendation = Recommendation::NoGo;
    r3.verdict.score = 90;
    r3.verdict.rationale = "Middleware X is mandatory and not supported by our platform".into();

    let merged = merge(&[r1, r2, r3]).unwrap();
    assert_eq!(merged.verdict.recommendation, Recommendation::NoGo);
    assert_eq!(merged.verdict.score, 53);
    assert_eq!(
        merged.verdict.rationale,
        "Middleware X is mandatory and not supported by our platform"
    );
}

#[test]
fn single_report_round_trips_field_for_field() {
    let mut only = run("0.1");
    only.summary_points = vec![
        "Seven-year reagent rental".into(),
        "Seven year reagent rental contract".into(),
    ];
    only.risks = vec![risk("R1", "Low risk first", 10), risk("R2", "High risk second", 90)];
    only.requirement_categories
        .insert("space_and_facility".into(), vec!["Floor load".into()]);

    let merged = merge(std::slice::from_ref(&only)).unwrap();
    assert_eq!(merged, only);
}

#[test]
fn disjoint_category_items_are_unioned_in_run_order() {
    let mut r1 = run("0.1");
    let mut r2 = run("0.4");
    r1.requirement_categories.insert(
        "space_and_facility".into(),
        vec![
            "Dedicated room of 120 square meters".into(),
            "Floor load capacity 600 kg".into(),
        ],
    );
    r2.requirement_categories.insert(
        "space_and_facility".into(),
        vec![
            "Air conditioning kept at 22 degrees".into(),
            "Uninterruptible power supply for the track".into(),
        ],
    );

    let merged = merge(&[r1, r2]).unwrap();
    assert_eq!(
        merged.requirement_categories["space_and_facility"],
        vec![
            "Dedicated room of 120 square meters",
            "Floor load capacity 600 kg",
            "Air conditioning kept at 22 degrees",
            "Uninterruptible power supply for the track",
        ]
    );
}

#[test]
fn empty_risk_list_from_one_run_does_not_hide_agreement() {
    let r1 = run("0.1");
    let mut r2 = run("0.4");
    let mut r3 = run("0.7");
    r2.risks = vec![
        risk("R1", "Delivery within eight weeks of award", 40),
        risk("R2", "Penalty clauses without any cap", 75),
    ];
    r3.risks = vec![
        risk("R1", "Eight weeks delivery deadline after award", 45),
        risk("R2", "Uncapped penalty clauses", 70),
    ];

    let groups = reconcile_records(
        &[r1.risks.as_slice(), r2.risks.as_slice(), r3.risks.as_slice()],
        &MergeOptions::default(),
        1,
    );
    assert_eq!(groups.len(), 2);
    assert!(groups.iter().all(|g| g.support == 2));

    let merged = merge(&[r1, r2, r3]).unwrap();
    assert_eq!(merged.risks.len(), 2);
    assert_eq!(merged.risks[0].score, 75);
    assert_eq!(merged.risks[1].score, 45);
}

#[test]
fn deadlines_merge_on_milestone() {
    let mut r1 = run("0.1");
    let mut r2 = run("0.4");
    r1.deadlines = vec![Deadline {
        milestone: "Clarification questions deadline".into(),
        when: "2025-03-10".into(),
        evidence: String::new(),
    }];
    r2.deadlines = vec![
        Deadline {
            milestone: "Deadline for clarification questions".into(),
            when: "10 March 2025".into(),
            evidence: "Bando, sez. IV.2.2".into(),
        },
        Deadline {
            milestone: "Offer submission".into(),
            when: "2025-04-02".into(),
            evidence: String::new(),
        },
    ];

    let merged = merge(&[r1, r2]).unwrap();
    assert_eq!(merged.deadlines.len(), 2);
    assert_eq!(merged.deadlines[0].evidence, "Bando, sez. IV.2.2");
    assert_eq!(merged.deadlines[1].milestone, "Offer submission");
}

#[test]
fn fewer_reports_than_planned_merge_normally() {
    // Three runs were planned; one failed upstream.
    let merged = merge(&[run("0.1"), run("0.7")]).unwrap();
    assert_eq!(merged.usage_meta.run_count, 2);
    assert_eq!(merged.usage_meta.total_tokens, 102_000);
    assert_eq!(merged.city, "Padova");
}

#[test]
fn empty_input_fails() {
    assert_eq!(merge(&[]), Err(MergeError::NoReports));
}

#[test]
fn incomplete_json_runs_merge_permissively() {
    let full = serde_json::to_string(&run("0.1")).unwrap();
    let partial = r#"{"title": "Fornitura sistema di automazione totale di laboratorio",
                      "risks": null, "verdict": {"recommendation": "NO-GO"}}"#;

    let reports = vec![
        StructuredReport::from_json(&full).unwrap(),
        StructuredReport::from_json(partial).unwrap(),
    ];
    let merged = merge(&reports).unwrap();
    assert_eq!(merged.verdict.recommendation, Recommendation::NoGo);
    assert_eq!(merged.verdict.score, 25);
    assert_eq!(merged.city, "Padova");
    assert_eq!(merged.usage_meta.run_count, 2);
}

#[test]
fn legacy_report_without_run_count_merges_alone() {
    let legacy = r#"{
        "tender_title": "Fornitura sistema di automazione totale di laboratorio",
        "_meta": {"model": "gpt-4o", "prompt_tokens": 48000, "completion_tokens": 3000,
                  "total_tokens": 51000, "estimated_cost_usd": 0.15}
    }"#;
    let report = StructuredReport::from_json(legacy).unwrap();
    let merged = merge(std::slice::from_ref(&report)).unwrap();
    assert_eq!(merged, report);
    assert_eq!(merged.usage_meta.run_count, 1);
}

#[test]
fn report_with_both_key_spellings_merges() {
    let both = r#"{
        "title": "Fornitura sistema di automazione totale di laboratorio",
        "tender_title": "Automazione laboratorio",
        "risks": [{"risk": "Penalties", "risk_text": "Uncapped penalty clauses", "score": 70}]
    }"#;
    let merged = merge(&[run("0.1"), StructuredReport::from_json(both).unwrap()]).unwrap();
    assert_eq!(merged.title, "Fornitura sistema di automazione totale di laboratorio");
    assert_eq!(merged.risks.len(), 1);
    assert_eq!(merged.risks[0].risk_text, "Uncapped penalty clauses");
}
