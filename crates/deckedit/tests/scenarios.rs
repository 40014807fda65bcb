//! End-to-end scenarios (S1-S6) and quantified invariants (1-6)

use nalgebra::Vector3;
use ntools_deckedit::{Deck, ExtractMode, Filter, ImpMode, Location};
use rstest::{fixture, rstest};

#[fixture]
fn two_cell_deck() -> Deck {
    let text = "c header\n\
1 1 -1.0 -1 2 imp:n=1\n\
2 0 1 imp:n=0\n\
\n\
1 so 10.0\n\
2 px 5.0\n\
\n\
tr1 0 0 0 1 0 0 0 1 0 0 0 1\n\
\n";
    Deck::from_text(text, None).unwrap()
}

#[fixture]
fn identity_transform_deck() -> Deck {
    let text = "c header\n1 0 -1 imp:n=1\n\n1 so 10.0\n\n";
    Deck::from_text(text, None).unwrap()
}

#[fixture]
fn three_cell_deck() -> Deck {
    let text = "c header\n\
1 1 -1.0 -1 imp:n=1\n\
2 1 -1.0 -2 1 imp:n=1\n\
3 0 2 imp:n=0\n\
\n\
1 so 5.0\n\
2 so 10.0\n\
\n";
    Deck::from_text(text, Some("guest.i".to_string())).unwrap()
}

#[fixture]
fn closure_deck() -> Deck {
    let text = "c header\n\
8 1 -1.0 -5 imp:n=1\n\
12 1 -1.0 -5 9 #8 imp:n=1\n\
20 0 9 imp:n=0\n\
\n\
5 so 2.0\n\
9 so 50.0\n\
\n";
    Deck::from_text(text, None).unwrap()
}

// S1 - Renumber a two-cell deck
#[rstest]
fn s1_renumber_two_cell_deck(mut two_cell_deck: Deck) {
    two_cell_deck
        .renum(Filter::All, 10, Filter::All, 20, 30)
        .unwrap();
    let cell_ids: Vec<u32> = two_cell_deck.cells.iter().map(|c| c.id).collect();
    assert_eq!(cell_ids, vec![10, 11]);
    let surf_ids: Vec<u32> = two_cell_deck.surfaces.iter().map(|s| s.id).collect();
    assert_eq!(surf_ids, vec![20, 21]);
    assert_eq!(two_cell_deck.transforms[0].id, 30);
    if let ntools_deckedit::CellBody::Plain { geometry, .. } = &two_cell_deck.cells[0].body {
        assert!(geometry.contains("20"));
        assert!(geometry.contains("21"));
    }
}

// S2 - Pure translation
#[rstest]
fn s2_pure_translation(mut two_cell_deck: Deck) {
    two_cell_deck
        .translat(Vector3::new(10.0, 20.0, 30.0), None)
        .unwrap();
    let tr = two_cell_deck.get_tr();
    assert_eq!(tr.translation, Vector3::new(10.0, 20.0, 30.0));
    assert_eq!(tr.rotation, nalgebra::Matrix3::identity());
}

// S3 - Euler composition: TrRotZ(90) then TrRotY(90)
#[rstest]
fn s3_euler_composition(mut identity_transform_deck: Deck) {
    identity_transform_deck
        .tr_rot_z(Vector3::zeros(), 90.0, ntools_deckedit::AngleUnit::Deg, None)
        .unwrap();
    identity_transform_deck
        .tr_rot_y(Vector3::zeros(), 90.0, ntools_deckedit::AngleUnit::Deg, None)
        .unwrap();
    let r = identity_transform_deck.get_tr().rotation.map(|v| v.round());
    let expected = nalgebra::Matrix3::new(0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0);
    for i in 0..3 {
        for j in 0..3 {
            assert!((r[(i, j)] - expected[(i, j)]).abs() < 1e-12);
        }
    }
}

// S4 - Insert with overlap
#[rstest]
fn s4_insert_with_overlap(mut three_cell_deck: Deck, #[from(three_cell_deck)] guest: Deck) {
    let mut host = three_cell_deck;
    let before_host_max = host.cells.iter().map(|c| c.id).max().unwrap();
    host.insert(guest, Location::Unknown, false).unwrap();
    let mut ids: Vec<u32> = host.cells.iter().map(|c| c.id).collect();
    ids.sort_unstable();
    let mut deduped = ids.clone();
    deduped.dedup();
    assert_eq!(ids.len(), deduped.len(), "cell ids must be pairwise disjoint");
    assert!(ids.iter().max().unwrap() > &before_host_max);
}

// S5 - Extract subset closing over a cell-complement reference
#[rstest]
fn s5_extract_subset(closure_deck: Deck) {
    let extracted = closure_deck.extract(&[12], ExtractMode::Extract, 100.0).unwrap();
    let cell_ids: std::collections::HashSet<u32> =
        extracted.cells.iter().map(|c| c.id).collect();
    assert!(cell_ids.contains(&12));
    assert!(cell_ids.contains(&8));
    let surf_ids: std::collections::HashSet<u32> =
        extracted.surfaces.iter().map(|s| s.id).collect();
    assert!(surf_ids.contains(&5));
    assert!(surf_ids.contains(&9));
}

// S6 - Material dedup on Insert
#[rstest]
fn s6_material_dedup_on_insert() {
    let host_text = "c h\n1 1 -1.0 -1 imp:n=1\n2 0 1 imp:n=0\n\n1 so 10.0\n\nm1 1001 1.0\n\n";
    let guest_text = "c g\n1 1 -1.0 -1 imp:n=1\n2 0 1 imp:n=0\n\n1 so 5.0\n\nm1 1001 1.0\n\n";
    let mut host = Deck::from_text(host_text, None).unwrap();
    let guest = Deck::from_text(guest_text, Some("guest.i".to_string())).unwrap();
    host.insert(guest, Location::Unknown, false).unwrap();
    assert_eq!(host.materials.len(), 1);
}

// Invariant 1 - Renumber idempotence
#[rstest]
fn invariant_renumber_idempotence(mut two_cell_deck: Deck) {
    two_cell_deck.renum(Filter::All, 1, Filter::All, 1, 1).unwrap();
    let once = two_cell_deck.clone();
    two_cell_deck.renum(Filter::All, 1, Filter::All, 1, 1).unwrap();
    assert_eq!(
        once.cells.iter().map(|c| c.id).collect::<Vec<_>>(),
        two_cell_deck.cells.iter().map(|c| c.id).collect::<Vec<_>>()
    );
}

// Invariant 2 - Renumber preserves cardinalities
#[rstest]
fn invariant_renumber_preserves_cardinalities(mut two_cell_deck: Deck) {
    let (cells, surfaces, transforms) = (
        two_cell_deck.cells.len(),
        two_cell_deck.surfaces.len(),
        two_cell_deck.transforms.len(),
    );
    two_cell_deck.renum(Filter::All, 50, Filter::All, 60, 70).unwrap();
    assert_eq!(two_cell_deck.cells.len(), cells);
    assert_eq!(two_cell_deck.surfaces.len(), surfaces);
    assert_eq!(two_cell_deck.transforms.len(), transforms);
}

// Invariant 3 - Transform round trip
#[rstest]
fn invariant_transform_round_trip(mut identity_transform_deck: Deck) {
    let t = Vector3::new(3.0, -4.0, 5.0);
    identity_transform_deck.translat(t, None).unwrap();
    identity_transform_deck.translat(-t, None).unwrap();
    let tr = identity_transform_deck.get_tr();
    assert!(tr.translation.norm() < 1e-12);
    let diff = tr.rotation - nalgebra::Matrix3::identity();
    let max_abs = diff.iter().fold(0.0f64, |m, v| m.max(v.abs()));
    assert!(max_abs < 1e-12);
}

// Invariant 4 - *tr cardinal-angle exactness
#[rstest]
fn invariant_star_tr_cardinal_angles(mut identity_transform_deck: Deck) {
    identity_transform_deck
        .tr_rot_z(Vector3::zeros(), 90.0, ntools_deckedit::AngleUnit::Deg, None)
        .unwrap();
    let rotation = identity_transform_deck.get_tr().rotation;
    for i in 0..3 {
        for j in 0..3 {
            let v = rotation[(i, j)];
            assert!(
                (v - 1.0).abs() < 1e-12 || (v + 1.0).abs() < 1e-12 || v.abs() < 1e-12,
                "entry ({i},{j}) = {v} is not in {{-1,0,1}}"
            );
        }
    }
}

// Invariant 5 - Insert id closure (cells, surfaces, transforms all injective)
#[rstest]
fn invariant_insert_id_closure(three_cell_deck: Deck, #[from(three_cell_deck)] guest: Deck) {
    let mut host = three_cell_deck;
    host.insert(guest, Location::Unknown, true).unwrap();
    for ids in [
        host.cells.iter().map(|c| c.id).collect::<Vec<_>>(),
        host.surfaces.iter().map(|s| s.id).collect::<Vec<_>>(),
    ] {
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(ids.len(), sorted.len());
    }
}

// Invariant 6 - Extract reference closure
#[rstest]
fn invariant_extract_reference_closure(closure_deck: Deck) {
    let extracted = closure_deck.extract(&[12], ExtractMode::Extract, 100.0).unwrap();
    let cell_ids: std::collections::HashSet<u32> =
        extracted.cells.iter().map(|c| c.id).collect();
    let surf_ids: std::collections::HashSet<u32> =
        extracted.surfaces.iter().map(|s| s.id).collect();
    for cell in &extracted.cells {
        for s in cell.surface_refs() {
            assert!(surf_ids.contains(s), "surface {s} not in extracted set");
        }
        for c in cell.cell_refs() {
            assert!(cell_ids.contains(c), "cell complement {c} not in extracted set");
        }
    }
}

#[rstest]
fn emit_round_trip_smoke(two_cell_deck: Deck) {
    let rendered = two_cell_deck.render(ImpMode::In).unwrap();
    assert!(rendered.contains("so"));
}
