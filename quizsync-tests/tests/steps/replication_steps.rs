use cucumber::{then, when};
use quizsync_tests::QuizWorld;

// ===== When Steps =====

#[when(expr = "{string} selects {string}")]
async fn selects_answer(world: &mut QuizWorld, name: String, answer: String) {
    let index = world.answer_index(&name, &answer);
    let result = world.device_mut(&name).toggle_answer(index);
    world.record(result);
}

#[when(expr = "{string} checks the answer")]
async fn checks_answer(world: &mut QuizWorld, name: String) {
    let result = world.device_mut(&name).check_answer();
    world.record(result);
}

#[when(expr = "{string} moves to the next question")]
async fn next_question(world: &mut QuizWorld, name: String) {
    world.device_mut(&name).next_question();
}

#[when(expr = "{string} resets the progress")]
async fn resets_progress(world: &mut QuizWorld, name: String) {
    let wall = world.wall;
    let result = world.device_mut(&name).reset_progress(wall);
    world.record(result);
}

// ===== Then Steps =====

#[then(expr = "every device shows {int} correct and {int} wrong answer(s)")]
async fn every_device_counters(world: &mut QuizWorld, correct: u32, wrong: u32) {
    for device in world.running_devices() {
        let view = device.view(world.wall).session;
        assert_eq!(
            (view.correct_count, view.wrong_count),
            (correct, wrong),
            "device {:?} disagrees",
            device.transport().endpoint_id()
        );
    }
}

#[then(expr = "every device shows the question {string}")]
async fn every_device_question(world: &mut QuizWorld, text: String) {
    for device in world.running_devices() {
        let shown = device.view(world.wall).session.question.map(|q| q.text);
        assert_eq!(shown.as_deref(), Some(text.as_str()));
    }
}

#[then(expr = "{string} shows {string} as selected")]
async fn shows_selected(world: &mut QuizWorld, name: String, answer: String) {
    let selected = world
        .device(&name)
        .view(world.wall)
        .session
        .question
        .map(|q| {
            q.answers
                .into_iter()
                .any(|a| a.text == answer && a.selected)
        })
        .unwrap_or(false);
    assert!(selected, "{} does not show {} as selected", name, answer);
}

#[then("all devices agree on the session")]
async fn devices_agree(world: &mut QuizWorld) {
    let mut devices = world.running_devices();
    let Some(first) = devices.next() else {
        panic!("no running devices");
    };
    let expected = (first.session().snapshot(), first.session().presented());
    for device in devices {
        assert_eq!(
            (device.session().snapshot(), device.session().presented()),
            expected
        );
    }
}

#[then("the action is refused")]
async fn action_refused(world: &mut QuizWorld) {
    assert!(world.last_error.is_some(), "expected an error");
}

#[then("the action succeeds")]
async fn action_succeeds(world: &mut QuizWorld) {
    assert_eq!(world.last_error, None);
}
