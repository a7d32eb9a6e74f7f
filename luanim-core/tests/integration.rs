//! Integration Tests for the Engine
//!
//! These tests drive signals, the scene tree and the scheduler together
//! through the public API, one virtual frame at a time.

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec2;
use luanim_core::reactive::SignalGraph;
use luanim_core::{
    Command, Easing, Engine, EngineConfig, Error, Frame, NodeBuilder, TaskState,
};

fn engine() -> Engine {
    Engine::new(EngineConfig::default()).unwrap()
}

fn circles(frame: &Frame) -> Vec<f32> {
    frame
        .commands()
        .filter_map(|command| match command {
            Command::Circle { radius, .. } => Some(radius),
            _ => None,
        })
        .collect()
}

/// A written value reads back exactly.
#[test]
fn set_then_get_is_exact() {
    let mut graph = SignalGraph::new();
    let opacity = graph.create(0.1f32);
    let label = graph.create(String::from("a"));

    graph.set(opacity, 0.7).unwrap();
    graph.set(label, "b".to_string()).unwrap();

    assert_eq!(graph.get(opacity).unwrap(), 0.7);
    assert_eq!(graph.get(label).unwrap(), "b");
}

/// A tween reads the original value when it starts and exactly the target
/// once its duration has elapsed.
#[test]
fn tween_endpoints_are_exact() {
    let mut engine = engine();
    let x = engine.script().signal(0.1f32);
    engine.start(move |script| async move {
        script.animate(x, 0.3, 0.5, Easing::SineInOut).await
    });

    engine.step().unwrap();
    assert_eq!(engine.read(x).unwrap(), 0.1);

    engine.run_until(0.5, &mut Vec::<Frame>::new()).unwrap();
    assert_eq!(engine.now(), 0.5);
    assert_eq!(engine.read(x).unwrap(), 0.3);
}

/// Integer tweens only ever produce whole steps between the endpoints.
#[test]
fn integer_tweens_step_through_whole_values() {
    let mut engine = engine();
    let index = engine.script().signal(0i64);
    engine.start(move |script| async move {
        script.animate(index, 7, 1.0, Easing::Linear).await
    });

    let mut seen = Vec::new();
    for _ in 0..=60 {
        engine.step().unwrap();
        seen.push(engine.read(index).unwrap());
    }

    assert_eq!(seen.first(), Some(&0));
    assert_eq!(seen.last(), Some(&7));
    assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(seen.iter().all(|value| (0..=7).contains(value)));
    assert_eq!(seen[30], 4);
}

/// Moving a child to another parent keeps it, and its own children, in the
/// tree exactly once.
#[test]
fn detach_and_reattach_moves_subtree() {
    let mut engine = engine();
    let script = engine.script();
    let left = script.add(NodeBuilder::group()).unwrap();
    let right = script.add(NodeBuilder::group()).unwrap();
    let child = script.create(NodeBuilder::group()).unwrap();
    let leaf = script.create(NodeBuilder::circle(3.0)).unwrap();
    script.attach(child, leaf).unwrap();
    script.attach(left, child).unwrap();

    script.detach(left, child).unwrap();
    script.attach(right, child).unwrap();

    assert!(script.children(left).unwrap().is_empty());
    assert_eq!(script.children(right).unwrap(), vec![child]);
    assert_eq!(script.children(child).unwrap(), vec![leaf]);
    assert_eq!(circles(&engine.step().unwrap()), vec![3.0]);
}

/// A derived signal recomputes when a signal it read changes, and not when
/// an unrelated one does.
#[test]
fn derived_recomputes_only_for_its_inputs() {
    let mut graph = SignalGraph::new();
    let a = graph.create(1.0f32);
    let b = graph.create(2.0f32);
    let c = graph.create(3.0f32);
    let sum = graph.derive(move |cx| Ok(cx.read(a)? + cx.read(b)?)).unwrap();
    assert_eq!(graph.recompute_count(sum.id()), Some(1));

    graph.set(a, 10.0).unwrap();
    assert_eq!(graph.recompute_count(sum.id()), Some(2));
    graph.set(b, 20.0).unwrap();
    assert_eq!(graph.recompute_count(sum.id()), Some(3));
    graph.set(c, 30.0).unwrap();
    assert_eq!(graph.recompute_count(sum.id()), Some(3));

    assert_eq!(graph.get(sum).unwrap(), 30.0);
}

/// A derived signal reading itself is a cycle.
#[test]
fn self_reading_signal_is_cyclic() {
    let engine = engine();
    let script = engine.script();
    let err = script
        .derive_named::<f32, _>("self", |cx| cx.read_named::<f32>("self"))
        .unwrap_err();
    assert!(matches!(err, Error::CyclicDependency { .. }));
}

/// Two parallel waits of one and two seconds finish at their own instants.
#[test]
fn parallel_waits_finish_independently() {
    let mut engine = engine();
    let script = engine.script();
    let short = script.parallel(|script| async move {
        script.wait(1.0).await;
        Ok(())
    });
    let long = script.parallel(|script| async move {
        script.wait(2.0).await;
        Ok(())
    });

    engine.run_until(1.0, &mut Vec::<Frame>::new()).unwrap();
    assert_eq!(short.state(), Some(TaskState::Completed));
    assert_eq!(long.state(), Some(TaskState::Suspended));

    engine.run_until(2.0, &mut Vec::<Frame>::new()).unwrap();
    assert_eq!(long.state(), Some(TaskState::Completed));
}

/// Hiding a node removes its whole subtree from the next frame.
#[test]
fn visibility_gates_subtree() {
    let mut engine = engine();
    let script = engine.script();
    let shown = script.signal(true);
    let group = script.add(NodeBuilder::group().visible(shown)).unwrap();
    let dot = script.create(NodeBuilder::circle(4.0)).unwrap();
    script.attach(group, dot).unwrap();
    script.add(NodeBuilder::circle(9.0)).unwrap();

    assert_eq!(circles(&engine.step().unwrap()), vec![4.0, 9.0]);

    script.set(shown, false).unwrap();
    assert_eq!(circles(&engine.step().unwrap()), vec![9.0]);
}

/// `advance` moves a signal by a delta over a duration.
#[test]
fn advance_reaches_midpoint_and_target() {
    let mut engine = engine();
    let value = engine.script().signal(5.0f32);
    let done = Rc::new(RefCell::new(false));
    let flag = done.clone();
    engine.start(move |script| async move {
        script.advance(value, 10.0, 2.0).await?;
        *flag.borrow_mut() = true;
        Ok(())
    });

    engine.run_until(1.0, &mut Vec::<Frame>::new()).unwrap();
    assert_eq!(engine.read(value).unwrap(), 10.0);
    assert!(!*done.borrow());

    engine.run_until(2.0, &mut Vec::<Frame>::new()).unwrap();
    assert_eq!(engine.read(value).unwrap(), 15.0);
    assert!(*done.borrow());
    assert!(engine.is_complete());
}

/// Frames survive the MessagePack transport, string table included.
#[test]
fn frames_round_trip_through_msgpack() {
    let mut engine = engine();
    let script = engine.script();
    script
        .add(NodeBuilder::text("hello").position(Vec2::new(-10.0, 4.0)))
        .unwrap();

    let frame = engine.step().unwrap();
    let decoded = Frame::from_msgpack(&frame.to_msgpack().unwrap()).unwrap();
    assert_eq!(decoded, frame);
    assert!(decoded
        .commands()
        .any(|command| matches!(command, Command::Text { text: "hello", .. })));
}

/// Cancelling the root stops its children and ends the run with the
/// cancellation.
#[test]
fn cancelling_root_cancels_children() {
    let mut engine = engine();
    let child = Rc::new(RefCell::new(None));
    let slot = child.clone();
    let root = engine.start(move |script| async move {
        let handle = script.parallel(|script| async move {
            script.wait(5.0).await;
            Ok(())
        });
        *slot.borrow_mut() = Some(handle.clone());
        handle.await
    });

    engine.step().unwrap();
    engine.script().cancel(root);

    let child = child.borrow().clone().expect("child spawned");
    assert_eq!(engine.task_state(child.id()), Some(TaskState::Cancelled));
    assert_eq!(
        engine.run(&mut Vec::<Frame>::new(), 10),
        Err(Error::Cancelled { task: root })
    );
}
