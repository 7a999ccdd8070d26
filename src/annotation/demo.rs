//! Built-in segments shown when the server cannot be reached.

use super::types::Segment;

pub fn demo_segments() -> Vec<Segment> {
    [
        (0, 0.0, 2.04, " make sure that if we forget anything or..."),
        (1, 2.04, 2.68, " Patient has arrived."),
        (2, 4.12, 4.72, " Patient's here."),
        (
            3,
            6.38,
            9.54,
            " Let's dry off and stimulate the patient if that hasn't been done.",
        ),
    ]
    .into_iter()
    .map(|(id, start, end, text)| Segment {
        id,
        start,
        end,
        text: text.to_string(),
        speaker: String::new(),
    })
    .collect()
}
