//! Tablature to notehead transcription.

pub mod accidentals;
pub mod beam_grouper;
pub mod external;
pub mod key;
pub mod layer_builder;
pub mod score_def;
pub mod settings;
pub mod speller;
pub mod staff_splitter;
pub mod tuning;

use crate::parser::mei_tree::{parse_mei, write_mei, Element, MeiDocument, Node};
use crate::parser::primitive_parser::{parse_token, parse_unsigned};
use crate::parser::tab_parser::{parse_tab_layer, EventCounter, QuarterLength};
use crate::transcriber::beam_grouper::{BeamClassifier, BeamGrouper, TimeSignature};
use crate::transcriber::layer_builder::{directive_element, staff_element};
use crate::transcriber::score_def::ScoreDefTransformer;
use crate::transcriber::settings::Settings;
use crate::transcriber::speller::{Speller, SpellingClient};
use crate::transcriber::staff_splitter::StaffSplitter;
use crate::TranscribeError;
use num_rational::Ratio;
use std::fs;
use std::path::{Path, PathBuf};

/// Suffix appended to the input file stem
pub const OUTPUT_SUFFIX: &str = "-dipl";

/// Transcribes whole MEI documents with fixed settings.
pub struct Transcriber<'a> {
    settings: Settings,
    splitter: StaffSplitter,
    client: SpellingClient<'a>,
    grouper: BeamGrouper<'a>,
}

/// State carried from measure to measure within a score.
struct ScoreContext {
    meter: Option<TimeSignature>,
    measure_index: usize,
}

impl<'a> Transcriber<'a> {
    pub fn new(
        settings: Settings,
        speller: &'a mut dyn Speller,
        classifier: &'a mut dyn BeamClassifier,
    ) -> Self {
        Self {
            settings,
            splitter: StaffSplitter::new(settings.tuning, settings.staff),
            client: SpellingClient::new(speller, settings.key),
            grouper: BeamGrouper::new(classifier, settings.beams),
        }
    }

    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Build the transcribed document; the input is left untouched.
    ///
    /// Every `score` under `music` is transcribed. Event identifiers are
    /// unique across the document.
    pub fn transcribe(&mut self, document: &MeiDocument) -> Result<MeiDocument, TranscribeError> {
        let root = &document.root;
        let music = root.require_child("music", &root.name)?;
        if music.find_descendant("score").is_none() {
            return Err(TranscribeError::malformed(
                format!("{}/music", root.name),
                "missing <score>",
            ));
        }
        let mut counter = EventCounter::default();
        let root = self.rebuild_scores(root, &root.name, &mut counter)?;
        Ok(MeiDocument {
            prolog: document.prolog.clone(),
            root,
        })
    }

    fn rebuild_scores(
        &mut self,
        element: &Element,
        path: &str,
        counter: &mut EventCounter,
    ) -> Result<Element, TranscribeError> {
        let mut rebuilt = shell(element);
        for child in &element.children {
            let node = match child {
                Node::Element(inner) if inner.name == "score" => {
                    Node::Element(self.transcribe_score(inner, &format!("{path}/score"), counter)?)
                }
                Node::Element(inner) if inner.find_descendant("score").is_some() => {
                    let inner_path = format!("{path}/{}", inner.name);
                    Node::Element(self.rebuild_scores(inner, &inner_path, counter)?)
                }
                other => other.clone(),
            };
            rebuilt.children.push(node);
        }
        Ok(rebuilt)
    }

    fn transcribe_score(
        &mut self,
        score: &Element,
        path: &str,
        counter: &mut EventCounter,
    ) -> Result<Element, TranscribeError> {
        let score_def = score.require_child("scoreDef", path)?;
        let definition = ScoreDefTransformer::new(&self.settings)
            .transform(score_def, &format!("{path}/scoreDef"))?;
        let mut context = ScoreContext {
            meter: definition.meter,
            measure_index: 0,
        };
        let mut new_score_def = Some(definition.score_def);

        let mut rebuilt = shell(score);
        for child in &score.children {
            match child {
                Node::Element(inner) if inner.name == "scoreDef" && new_score_def.is_some() => {
                    rebuilt.children.extend(new_score_def.take().map(Node::Element));
                }
                Node::Element(inner) => {
                    let inner_path = format!("{path}/{}", inner.name);
                    let inner = self.rebuild_measures(inner, &inner_path, &mut context, counter)?;
                    rebuilt.push(inner);
                }
                other => rebuilt.children.push(other.clone()),
            }
        }
        log::debug!("Transcribed {} measures in {path}", context.measure_index);
        Ok(rebuilt)
    }

    fn rebuild_measures(
        &mut self,
        element: &Element,
        path: &str,
        context: &mut ScoreContext,
        counter: &mut EventCounter,
    ) -> Result<Element, TranscribeError> {
        if element.name == "measure" {
            context.measure_index += 1;
            let label = element
                .attr("n")
                .map_or_else(|| context.measure_index.to_string(), str::to_string);
            let measure_path = format!("{path}[{label}]");
            return self.transcribe_measure(element, &measure_path, context, counter);
        }
        let mut rebuilt = shell(element);
        for child in &element.children {
            match child {
                Node::Element(inner) => {
                    let inner_path = format!("{path}/{}", inner.name);
                    let inner = self.rebuild_measures(inner, &inner_path, context, counter)?;
                    rebuilt.push(inner);
                }
                other => rebuilt.children.push(other.clone()),
            }
        }
        Ok(rebuilt)
    }

    /// Notehead staves first, then the tablature staff (if kept), the
    /// measure's other content and finally the flag directives.
    fn transcribe_measure(
        &mut self,
        measure: &Element,
        path: &str,
        context: &ScoreContext,
        counter: &mut EventCounter,
    ) -> Result<Element, TranscribeError> {
        let index = context.measure_index;
        let tab_staff = measure.require_child("staff", path)?;
        let staff_path = format!("{path}/staff");
        let layer = tab_staff.require_child("layer", &staff_path)?;
        let events = parse_tab_layer(layer, counter, index, &format!("{staff_path}/layer"))?;

        let meter = context
            .meter
            .or_else(|| {
                let length: QuarterLength = events
                    .iter()
                    .map(|event| event.quarter_length())
                    .fold(Ratio::from_integer(0), |total, length| total + length);
                TimeSignature::from_measure_length(length)
            })
            .unwrap_or_default();
        let notated = self.splitter.split(&events, &mut self.client, index)?;
        log::debug!("Measure {index} in {meter} with {} groups", events.len());

        let mut rebuilt = shell(measure);
        let staves = std::iter::once(notated.upper).chain(notated.lower);
        for (position, staff) in staves.enumerate() {
            let items = self.grouper.group(staff, meter, index)?;
            rebuilt.push(staff_element(position + 1, items));
        }

        let mut tab_seen = false;
        for child in &measure.children {
            match child {
                Node::Element(staff) if !tab_seen && staff.name == "staff" => {
                    tab_seen = true;
                    if self.settings.keep_tab {
                        rebuilt.push(self.shift_tab_staff(staff, &staff_path)?);
                    }
                }
                other => rebuilt.children.push(other.clone()),
            }
        }
        for directive in &notated.directives {
            rebuilt.push(directive_element(directive));
        }
        Ok(rebuilt)
    }

    fn shift_tab_staff(&self, staff: &Element, path: &str) -> Result<Element, TranscribeError> {
        let n = staff
            .attr("n")
            .and_then(|n| parse_token(parse_unsigned, n))
            .ok_or_else(|| TranscribeError::malformed(path, "missing or invalid @n"))?;
        let mut staff = staff.clone();
        staff.set_attr("n", (n as usize + self.settings.tab_staff_shift()).to_string());
        Ok(staff)
    }
}

/// Copy of an element without its children.
fn shell(element: &Element) -> Element {
    Element {
        name: element.name.clone(),
        attributes: element.attributes.clone(),
        children: Vec::with_capacity(element.children.len()),
    }
}

/// Path of the transcription of `input`: `<output_dir>/<stem>-dipl.<ext>`.
pub fn output_path(input: &Path, output_dir: &Path) -> Result<PathBuf, TranscribeError> {
    let stem = input
        .file_stem()
        .ok_or_else(|| TranscribeError::IoError(format!("no file name in {}", input.display())))?;
    let mut name = stem.to_os_string();
    name.push(OUTPUT_SUFFIX);
    if let Some(extension) = input.extension() {
        name.push(".");
        name.push(extension);
    }
    Ok(output_dir.join(name))
}

/// Transcribe one file. The output is only written once the whole file has
/// been transcribed.
pub fn transcribe_file(
    input: &Path,
    output_dir: &Path,
    transcriber: &mut Transcriber,
) -> Result<PathBuf, TranscribeError> {
    log::info!("Transcribing {}", input.display());
    let output =
        write_transcription(input, output_dir, transcriber).map_err(|err| err.in_file(input))?;
    log::info!("Wrote {}", output.display());
    Ok(output)
}

fn write_transcription(
    input: &Path,
    output_dir: &Path,
    transcriber: &mut Transcriber,
) -> Result<PathBuf, TranscribeError> {
    let data = fs::read(input)?;
    let document = parse_mei(&data)?;
    let transcribed = transcriber.transcribe(&document)?;
    let text = write_mei(&transcribed)?;
    let output = output_path(input, output_dir)?;
    fs::create_dir_all(output_dir)?;
    fs::write(&output, text)?;
    Ok(output)
}
