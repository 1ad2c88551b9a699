use crate::model::forest::StoreError;
use crate::model::store::Store;
use crate::ops::thread_ops::{TaskPatch, add_question, add_task, add_thread};

/// Fill an empty store with the starter threads shown on first run.
pub fn seed_example(store: &mut Store) -> Result<(), StoreError> {
    let fitness = add_thread(store, None, "Fitness")?;
    add_thread(store, Some(&fitness), "Strength")?;
    add_thread(store, Some(&fitness), "Cardio")?;
    add_thread(store, None, "Reading")?;

    let academic = add_thread(store, None, "Academic")?;
    add_thread(store, Some(&academic), "Personal Reading")?;
    let exam = add_thread(store, Some(&academic), "Exam Study")?;
    add_thread(store, Some(&academic), "Clinical Audit")?;

    add_question(store, &exam, "When do I plan to complete this?")?;
    add_task(store, &exam, "Read chapter on cardiology", TaskPatch::default())?;
    Ok(())
}
