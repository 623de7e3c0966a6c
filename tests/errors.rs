//! Error classification across wiring and stepping.
//!
//! Every failure surfaces as a [`ProjError`] whose [`ErrorKind`] tells
//! capability problems, lookups, shapes, conflicts and bad parameters apart.

use synalign::delay::{Delay, DelayBuffer};
use synalign::dynamics::{shared, AlignPostSynapse, ParamDesc, PreSynapse, SynOutput};
use synalign::error::{ErrorKind, ProjError};
use synalign::info::ReturnInfo;
use synalign::models::{Cuba, Expon, Lif, OneToOne, Relay, ScriptedSource};
use synalign::network::Network;
use synalign::node::Population;
use synalign::params::Params;
use synalign::projection::{
    ProjAlignPost2, ProjAlignPostMg1, ProjAlignPostMg2, ProjAlignPre1, ProjAlignPre2, ProjAlignPreMg1,
    ProjAlignPreMg2, VanillaProj,
};
use synalign::tensor::Tensor;

fn expon() -> ParamDesc<dyn AlignPostSynapse> {
    ParamDesc::of::<Expon>(Params::new().with("size", 2usize).with("tau", 5.0))
}

fn cuba() -> ParamDesc<dyn SynOutput> {
    ParamDesc::of::<Cuba>(Params::new())
}

fn pre_expon(tau: f64) -> ParamDesc<dyn PreSynapse> {
    ParamDesc::of::<Expon>(Params::new().with("size", 2usize).with("tau", tau))
}

fn one_to_one() -> Box<OneToOne> {
    Box::new(OneToOne::new(1.0))
}

// ============================================================================
// Capability
// ============================================================================

#[test]
fn test_opaque_source_cannot_be_delayed() {
    let src = Population::new(0, "S", ScriptedSource::silent(&[2]).opaque(), 0.1);
    let post = Population::new(1, "E", Lif::new(&[2], 0.1), 0.1);

    let err = ProjAlignPost2::new(
        "S->E",
        &src,
        Some(Delay::Steps(1)),
        Box::new(OneToOne::new(1.0)),
        shared(Expon::new(&[2], 5.0, 0.1)),
        shared(Cuba::new()),
        &post,
    )
    .err()
    .unwrap();
    assert_eq!(err.kind(), ErrorKind::Capability);
    assert!(matches!(err, ProjError::Capability { role: "pre", .. }));
    // Nothing was wired into the destination.
    assert_eq!(post.input_count(), 0);
}

#[test]
fn test_source_cannot_receive_input() {
    let src = Population::new(0, "S", ScriptedSource::silent(&[2]), 0.1);
    let err = VanillaProj::new("x", Box::new(OneToOne::new(1.0)), shared(Cuba::new()), &src)
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::Capability);
    assert!(matches!(
        err,
        ProjError::Capability {
            role: "post",
            capability: "input functions",
            ..
        }
    ));

    let err = ProjAlignPostMg1::new("y", Box::new(OneToOne::new(1.0)), &expon(), &cuba(), &src)
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::Capability);
    assert_eq!(src.before_hook_count(), 0);
}

// ============================================================================
// Lookup
// ============================================================================

#[test]
fn test_lookup_errors() {
    let buffer = DelayBuffer::from_value(Tensor::zeros(&[1]), 0.1);
    assert_eq!(buffer.at("missing").unwrap_err().kind(), ErrorKind::Lookup);

    let net = Network::new(0.1);
    let err = net.population("nowhere").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Lookup);
}

#[test]
fn test_driven_projection_requires_driver() {
    let mut net = Network::new(0.1);
    let post = net.add_population("R", Relay::new(&[2])).unwrap();
    let proj = VanillaProj::new("v", Box::new(OneToOne::new(1.0)), shared(Cuba::new()), &*post).unwrap();
    let err = net.add_projection(proj, None).unwrap_err();
    assert!(matches!(err, ProjError::MissingInput(_)));
}

// ============================================================================
// Shape
// ============================================================================

#[test]
fn test_shape_errors() {
    let mut buffer = DelayBuffer::from_value(Tensor::zeros(&[3]), 0.1);
    let err = buffer.update(&Tensor::zeros(&[2])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Shape);
    assert!(matches!(err, ProjError::ShapeMismatch { .. }));

    let info = ReturnInfo::new(&[3, 2]).with_axis_names(["neuron"]);
    let err = info.initial_value().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Shape);
}

#[test]
fn test_mismatched_comm_fails_the_step() {
    let mut net = Network::new(0.1);
    let pre = net.add_population("E", Lif::new(&[3], 0.1)).unwrap();
    let post = net.add_population("I", Relay::new(&[2])).unwrap();
    let proj = ProjAlignPostMg1::new("E->I", Box::new(OneToOne::new(1.0)), &expon(), &cuba(), &*post).unwrap();
    net.add_projection(proj, Some(pre.id())).unwrap();

    let err = net.step().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Shape);
}

// ============================================================================
// Conflict
// ============================================================================

#[test]
fn test_conflicts() {
    let mut buffer = DelayBuffer::from_value(Tensor::zeros(&[1]), 0.1);
    buffer.register_entry("p", Some(Delay::Steps(2))).unwrap();
    assert_eq!(
        buffer.register_entry("p", Some(Delay::Steps(4))).unwrap_err().kind(),
        ErrorKind::Conflict
    );

    let mut net = Network::new(0.1);
    net.add_population("E", Relay::new(&[1])).unwrap();
    let err = net.add_population("E", Relay::new(&[1])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[test]
fn test_duplicate_input_name_is_a_conflict() {
    let post = Population::new(0, "I", Relay::new(&[2]), 0.1);
    VanillaProj::new("same", Box::new(OneToOne::new(1.0)), shared(Cuba::new()), &post).unwrap();
    let err = VanillaProj::new("same", Box::new(OneToOne::new(1.0)), shared(Cuba::new()), &post)
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

// ============================================================================
// Parameter
// ============================================================================

#[test]
fn test_parameter_errors() {
    let pre = Population::new(0, "E", Lif::new(&[2], 0.1), 0.1);
    let post = Population::new(1, "I", Lif::new(&[2], 0.1), 0.1);
    let syn = pre_expon(5.0);

    let err = ProjAlignPreMg2::new(
        "p",
        &pre,
        Some(Delay::Time(-1.0)),
        &syn,
        Box::new(OneToOne::new(1.0)),
        shared(Cuba::new()),
        &post,
    )
    .err()
    .unwrap();
    assert_eq!(err.kind(), ErrorKind::Parameter);

    let bad: ParamDesc<dyn AlignPostSynapse> = ParamDesc::of::<Expon>(Params::new().with("size", 2usize));
    let err = ProjAlignPostMg1::new("q", Box::new(OneToOne::new(1.0)), &bad, &cuba(), &post)
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::Parameter);
    assert!(matches!(err, ProjError::InvalidParam { ref key, .. } if key == "tau"));
    assert_eq!(post.before_hook_count(), 0);
}

#[test]
fn test_oversized_delay_is_rejected() {
    let pre = Population::new(0, "E", Lif::new(&[2], 0.1), 0.1);
    let post = Population::new(1, "I", Lif::new(&[2], 0.1), 0.1);

    for delay in [Delay::Steps(usize::MAX), Delay::Time(1e300)] {
        let err = ProjAlignPost2::new(
            "p",
            &pre,
            Some(delay),
            one_to_one(),
            shared(Expon::new(&[2], 5.0, 0.1)),
            shared(Cuba::new()),
            &post,
        )
        .err()
        .unwrap();
        assert!(matches!(err, ProjError::InvalidDelay(_)));
    }
    assert_eq!(pre.after_hook_count(), 0);
    assert_eq!(post.input_count(), 0);
}

// ============================================================================
// Atomic Construction
// ============================================================================

#[test]
fn test_rejected_destination_leaves_source_untouched() {
    let pre = Population::new(0, "E", Lif::new(&[2], 0.1), 0.1);
    let source = Population::new(1, "S", ScriptedSource::silent(&[2]), 0.1);
    let syn = pre_expon(5.0);

    let errors = vec![
        ProjAlignPre1::new(
            "p",
            &pre,
            shared(Expon::new(&[2], 5.0, 0.1)),
            Some(Delay::Steps(1)),
            one_to_one(),
            shared(Cuba::new()),
            &source,
        )
        .err(),
        ProjAlignPreMg1::new("p", &pre, &syn, Some(Delay::Steps(1)), one_to_one(), shared(Cuba::new()), &source).err(),
        ProjAlignPre2::new(
            "p",
            &pre,
            Some(Delay::Steps(1)),
            shared(Expon::new(&[2], 5.0, 0.1)),
            one_to_one(),
            shared(Cuba::new()),
            &source,
        )
        .err(),
        ProjAlignPreMg2::new("p", &pre, Some(Delay::Steps(1)), &syn, one_to_one(), shared(Cuba::new()), &source).err(),
        ProjAlignPost2::new(
            "p",
            &pre,
            Some(Delay::Steps(1)),
            one_to_one(),
            shared(Expon::new(&[2], 5.0, 0.1)),
            shared(Cuba::new()),
            &source,
        )
        .err(),
        ProjAlignPostMg2::new("p", &pre, Some(Delay::Steps(1)), one_to_one(), &expon(), &cuba(), &source).err(),
    ];

    for err in errors {
        assert_eq!(err.unwrap().kind(), ErrorKind::Capability);
    }
    assert_eq!(pre.after_hook_count(), 0);
    assert_eq!(source.before_hook_count(), 0);
    assert_eq!(source.input_count(), 0);
}

#[test]
fn test_corrected_construction_succeeds_after_failure() {
    let pre = Population::new(0, "E", Lif::new(&[2], 0.1), 0.1);
    let source = Population::new(1, "S", ScriptedSource::silent(&[2]), 0.1);
    let post = Population::new(2, "I", Lif::new(&[2], 0.1), 0.1);

    let build = |target: &Population| {
        ProjAlignPre1::new(
            "p",
            &pre,
            shared(Expon::new(&[2], 5.0, 0.1)),
            Some(Delay::Steps(1)),
            one_to_one(),
            shared(Cuba::new()),
            target,
        )
    };
    assert!(build(&source).is_err());
    let proj = build(&post).unwrap();
    assert_eq!(pre.after_hook_count(), 1);
    assert_eq!(post.input_names(), vec!["p"]);
    assert_eq!(proj.unit().lock().delay().map(|d| d.depth()), Some(2));
}

#[test]
fn test_bad_delayed_synapse_leaves_source_untouched() {
    let pre = Population::new(0, "E", Lif::new(&[2], 0.1), 0.1);
    let post = Population::new(1, "I", Lif::new(&[2], 0.1), 0.1);

    let err = ProjAlignPreMg2::new(
        "p",
        &pre,
        Some(Delay::Steps(2)),
        &pre_expon(-1.0),
        one_to_one(),
        shared(Cuba::new()),
        &post,
    )
    .err()
    .unwrap();
    assert_eq!(err.kind(), ErrorKind::Parameter);
    assert_eq!(pre.after_hook_count(), 0);
    assert_eq!(post.input_count(), 0);

    let proj = ProjAlignPreMg2::new(
        "p",
        &pre,
        Some(Delay::Steps(2)),
        &pre_expon(5.0),
        one_to_one(),
        shared(Cuba::new()),
        &post,
    )
    .unwrap();
    assert_eq!(proj.delay().lock().depth(), 3);
    assert_eq!(pre.after_hook_count(), 1);
}
