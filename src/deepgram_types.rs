use serde::Deserialize;

/// Response envelope for Deepgram's prerecorded listen endpoint.
#[derive(Deserialize, Debug)]
pub struct PrerecordedResponse {
    pub results: TranscriptionResults,
}

#[derive(Deserialize, Debug)]
pub struct TranscriptionResults {
    pub channels: Vec<Channel>,
}

#[derive(Deserialize, Default, Debug)]
pub struct Channel {
    pub alternatives: Vec<Alternative>,
}

#[allow(dead_code)]
#[derive(Deserialize, Default, Debug)]
pub struct Alternative {
    pub transcript: String,
    pub confidence: f32,
    #[serde(default)]
    pub words: Vec<Word>,
}

#[allow(dead_code)]
#[derive(Deserialize, Default, Debug)]
pub struct Word {
    pub word: String,
    pub start: f32,
    pub end: f32,
    pub confidence: f32,
}
