//! Demonstration of pose feature extraction.
//!
//! This example shows how to:
//! 1. Build poses as an external detector would report them
//! 2. Compute joint angles and normalized points for one frame
//! 3. Run a batch extraction with the skip policy
//! 4. Count repetitions from per-frame predictions
//!
//! Run with: cargo run --example extract_demo

use pose_feature_extractor::{
    config::{ErrorPolicy, LabelSet},
    core::{dataset, BatchExtractor, BatchOptions, FeatureMode, FeatureRow, Landmark, Pose},
    detector::DetectionRecord,
    report::create_shared_log,
    FeatureExtractor, RepCounter,
};

/// A synthetic 33-landmark pose; `bend` folds the arms and legs.
fn synthetic_pose(bend: f64) -> Pose {
    let mut landmarks: Vec<Landmark> = (0..33)
        .map(|i| Landmark::new(0.4 + 0.004 * i as f64, 0.2 + 0.01 * i as f64, -0.05))
        .collect();

    let mut set = |index: usize, x: f64, y: f64, z: f64| landmarks[index] = Landmark::new(x, y, z);
    set(0, 0.50, 0.10, -0.10);
    set(11, 0.42, 0.25, -0.02);
    set(12, 0.58, 0.25, -0.02);
    set(13, 0.38 - 0.05 * bend, 0.40, 0.00);
    set(14, 0.62 + 0.05 * bend, 0.40, 0.00);
    set(15, 0.37, 0.55 - 0.10 * bend, 0.02);
    set(16, 0.63, 0.55 - 0.10 * bend, 0.02);
    set(23, 0.45, 0.55, 0.00);
    set(24, 0.55, 0.55, 0.00);
    set(25, 0.44 - 0.08 * bend, 0.72 - 0.05 * bend, 0.03);
    set(26, 0.56 + 0.08 * bend, 0.72 - 0.05 * bend, 0.03);
    set(27, 0.44, 0.90, 0.05);
    set(28, 0.56, 0.90, 0.05);

    Pose::new(landmarks)
}

fn main() {
    println!("Pose Feature Extractor - Demo");
    println!("=============================");
    println!();

    let extractor = FeatureExtractor::canonical();

    // Single frame
    let pose = synthetic_pose(0.5);
    match extractor.compute_all_angles(&pose) {
        Ok(angles) => {
            println!("Joint angles (degrees):");
            for (name, value) in angles.iter() {
                println!("  {name:<28} {:>7.2}", value.to_degrees());
            }
        }
        Err(e) => eprintln!("Could not compute angles: {e}"),
    }
    println!();

    match extractor.build_point_feature_row(&pose, true) {
        Ok(values) => {
            println!("Normalized points (first three body parts):");
            for (part, triple) in extractor.skeleton().body_parts().iter().zip(values.chunks(3)).take(3) {
                println!("  {:<14} x={:.3} y={:.3} z={:.3}", part.name, triple[0], triple[1], triple[2]);
            }
        }
        Err(e) => eprintln!("Could not normalize pose: {e}"),
    }
    println!();

    println!("Row widths per feature mode:");
    for mode in FeatureMode::ALL {
        match extractor.extract(&pose, mode) {
            Ok(values) => println!("  {mode:<18} {} values", values.len()),
            Err(e) => println!("  {mode:<18} failed: {e}"),
        }
    }
    println!();

    // Batch with one empty detection and one degenerate pose
    let records = vec![
        DetectionRecord::new("squat", synthetic_pose(0.0)).with_source("squat_1/frame0.jpg"),
        DetectionRecord::new("squat", synthetic_pose(1.0)).with_source("squat_1/frame1.jpg"),
        DetectionRecord::new("squat", Pose::default()).with_source("squat_1/frame2.jpg"),
        DetectionRecord::new("squat", Pose::new(vec![Landmark::new(0.5, 0.5, 0.0); 33]))
            .with_source("squat_1/frame3.jpg"),
    ];

    let log = create_shared_log();
    let batch = BatchExtractor::new(
        extractor.clone(),
        BatchOptions {
            mode: FeatureMode::Angles,
            labels: LabelSet::exercises(),
            on_error: ErrorPolicy::Skip,
            workers: 2,
        },
        log.clone(),
    );

    let mut rows: Vec<FeatureRow> = Vec::new();
    match batch.run(records.into_iter().map(Ok), &mut rows) {
        Ok(_) => {
            println!("{}", dataset::header(&extractor, FeatureMode::Angles).join(","));
            for row in &rows {
                println!("{}", row.to_csv());
            }
        }
        Err(e) => eprintln!("Batch failed: {e}"),
    }
    println!();
    println!("{}", log.summary());
    println!();

    // Rep counting from (exercise, stage) predictions
    let mut counter = RepCounter::new(10, 3);
    for cycle in 0..4 {
        for stage in ["end", "start"] {
            for _ in 0..3 {
                counter.process("squat", stage);
            }
        }
        println!("After cycle {}: {} reps", cycle + 1, counter.reps());
    }

    println!();
    println!("Demo complete!");
}
