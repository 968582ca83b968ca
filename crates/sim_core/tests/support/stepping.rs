use sim_core::clock::SimTime;
use sim_core::engine::{Engine, EngineState, ModelLogic};

/// Steps `engine` to completion, calling `inspect` after every tick with the
/// clock value and the model.
pub fn step_to_end<M, F>(engine: &mut Engine<M>, mut inspect: F) -> EngineState
where
    M: ModelLogic,
    F: FnMut(SimTime, &M),
{
    loop {
        let state = engine.step().expect("tick should succeed");
        if matches!(state, EngineState::Finished(_)) {
            return state;
        }
        inspect(engine.now(), engine.model());
    }
}

/// Installs a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
