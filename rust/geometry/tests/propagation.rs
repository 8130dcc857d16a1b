// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Facet edits flowing back into their owning block.

use std::sync::{Arc, Mutex};

use approx::assert_relative_eq;
use blocks_geometry::{
    Block, CapKind, ChangeOrigin, Error, GeometryChanged, GeometryObserver, Isometry3, MainPlane,
    PlaneEquation, Point3, Vector3,
};
use nalgebra::{Translation3, UnitQuaternion};

fn cube() -> Block {
    let main = MainPlane::new(
        PlaneEquation::new(Vector3::z(), 0.0).unwrap(),
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ],
    )
    .unwrap();
    Block::new(main, 1.0, Vector3::z(), 0.0, Vector3::z(), "cube").unwrap()
}

type Log = Arc<Mutex<Vec<GeometryChanged>>>;

fn recorder() -> (Log, Box<dyn GeometryObserver + Send>) {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    (
        log,
        Box::new(move |e: &GeometryChanged| sink.lock().unwrap().push(*e)),
    )
}

#[test]
fn moved_top_facet_resyncs_block() {
    let mut block = cube();
    block
        .transform_facet(CapKind::Top, &Isometry3::translation(0.0, 0.0, 2.0))
        .unwrap();

    assert_relative_eq!(block.top_height(), 3.0, epsilon = 1e-12);
    assert_relative_eq!(block.volume(), 3.0, epsilon = 1e-12);
    for p in block.top_facet().contour() {
        assert_relative_eq!(p.z, 3.0, epsilon = 1e-12);
    }
    // The rebuild re-formed the facet on behalf of the block
    assert_eq!(block.top_facet().last_change_origin(), Some(ChangeOrigin::Owner));
}

#[test]
fn tilted_bottom_facet_resyncs_normal() {
    let mut block = cube();
    let tilt = Isometry3::from_parts(
        Translation3::new(0.0, 0.0, 0.0),
        UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.2),
    );
    block.transform_facet(CapKind::Bottom, &tilt).unwrap();

    assert_relative_eq!(
        block.bottom_normal(),
        Vector3::new(0.0, -(0.2f64).sin(), (0.2f64).cos()),
        epsilon = 1e-9
    );
    // Bottom stays below the top and keeps facing down
    assert!(!block.is_hole());
    assert!(block.bottom_facet().normal().z < 0.0);
    assert!(block.volume() > 0.0);
}

#[test]
fn rebuild_does_not_echo_into_facet_observers() {
    let mut block = cube();
    let (facet_log, facet_observer) = recorder();
    let (block_log, block_observer) = recorder();

    block
        .edit_facet(CapKind::Top, |facet| facet.set_observer(facet_observer))
        .unwrap();
    block.set_observer(block_observer);

    block
        .transform_facet(CapKind::Top, &Isometry3::translation(0.0, 0.0, 1.0))
        .unwrap();

    // One external edit on the facet, one committed rebuild on the block
    let facet_events = facet_log.lock().unwrap();
    assert_eq!(facet_events.len(), 1);
    assert_eq!(facet_events[0].origin, ChangeOrigin::External);
    assert_eq!(block_log.lock().unwrap().len(), 1);

    // Block-side edits re-form the facets without notifying their observers
    drop(facet_events);
    block.set_top_height(5.0).unwrap();
    assert_eq!(facet_log.lock().unwrap().len(), 1);
    assert_eq!(block_log.lock().unwrap().len(), 2);
}

#[test]
fn annotation_edits_do_not_rebuild() {
    let mut block = cube();
    let revision = block.revision();
    let facet_revision = block.top_facet().revision();

    block
        .edit_facet(CapKind::Top, |facet| {
            facet.set_coverage(0.5);
            facet.set_name("roof");
        })
        .unwrap();

    assert_eq!(block.revision(), revision);
    assert_eq!(block.top_facet().revision(), facet_revision);
    assert_eq!(block.top_facet().coverage(), 0.5);
}

#[test]
fn rejected_facet_edit_is_rolled_back() {
    let mut block = cube();
    let mesh = block.mesh().clone();
    let contour = block.top_facet().contour().to_vec();

    // A quarter turn makes the cap plane parallel to the main normal
    let quarter = Isometry3::from_parts(
        Translation3::new(0.0, 0.0, 0.0),
        UnitQuaternion::from_axis_angle(&Vector3::x_axis(), std::f64::consts::FRAC_PI_2),
    );
    let result = block.transform_facet(CapKind::Top, &quarter);

    assert!(matches!(result, Err(Error::DegenerateBlock(_))));
    assert_eq!(block.mesh(), &mesh);
    assert_eq!(block.top_facet().contour(), contour.as_slice());
    assert_relative_eq!(block.top_facet().normal(), Vector3::z(), epsilon = 1e-12);
    assert_relative_eq!(block.top_height(), 1.0);
}

#[test]
fn failed_re_form_inside_edit_is_repaired_by_resync() {
    let mut block = cube();
    let result = block.edit_facet(CapKind::Bottom, |facet| {
        facet.form_by_contour(&[Point3::origin(), Point3::new(1.0, 0.0, 0.0)], true, None)
    });

    // The closure's own error is returned as its output; the resync then
    // runs against the unchanged plane and succeeds.
    let inner = result.unwrap();
    assert!(matches!(inner, Err(Error::InsufficientData { .. })));
    assert_eq!(block.bottom_facet().contour().len(), 4);
    assert_relative_eq!(block.volume(), 1.0, epsilon = 1e-12);
}
