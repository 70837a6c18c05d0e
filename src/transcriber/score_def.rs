use crate::parser::mei_tree::{Element, Node};
use crate::parser::primitive_parser::{parse_token, parse_unsigned};
use crate::transcriber::beam_grouper::TimeSignature;
use crate::transcriber::settings::{NotationType, Settings, StaffStyle};
use crate::TranscribeError;

/// Result of transforming a score definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreDefinition {
    pub score_def: Element,
    /// Meter of the tablature, `None` when only a mensuration sign is given
    pub meter: Option<TimeSignature>,
}

/// Rebuilds `scoreDef` to host the notehead staves.
pub struct ScoreDefTransformer<'a> {
    settings: &'a Settings,
}

impl<'a> ScoreDefTransformer<'a> {
    pub const fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    pub fn transform(
        &self,
        score_def: &Element,
        path: &str,
    ) -> Result<ScoreDefinition, TranscribeError> {
        let grp_path = format!("{path}/staffGrp");
        let staff_grp = score_def.require_child("staffGrp", path)?;
        let tab_def = staff_grp.require_child("staffDef", &grp_path)?;
        let def_path = format!("{grp_path}/staffDef");
        let meter = read_meter(tab_def, score_def);
        log::debug!("Tablature meter {meter:?}");

        let mut new_grp = Element {
            name: staff_grp.name.clone(),
            attributes: staff_grp.attributes.clone(),
            children: Vec::with_capacity(staff_grp.children.len() + 1),
        };
        new_grp.push(self.notehead_group(tab_def));
        let mut tab_seen = false;
        for child in &staff_grp.children {
            match child {
                Node::Element(element) if !tab_seen && element.name == "staffDef" => {
                    tab_seen = true;
                    if self.settings.keep_tab {
                        new_grp.push(self.tab_staff_def(element, &def_path)?);
                    }
                }
                other => new_grp.children.push(other.clone()),
            }
        }

        let mut new_score_def = Element {
            name: score_def.name.clone(),
            attributes: score_def.attributes.clone(),
            children: Vec::with_capacity(score_def.children.len()),
        };
        let mut new_grp = Some(new_grp);
        for child in &score_def.children {
            match child {
                Node::Element(element) if element.name == "staffGrp" && new_grp.is_some() => {
                    new_score_def.children.extend(new_grp.take().map(Node::Element));
                }
                other => new_score_def.children.push(other.clone()),
            }
        }
        Ok(ScoreDefinition {
            score_def: new_score_def,
            meter,
        })
    }

    fn notehead_group(&self, tab_def: &Element) -> Element {
        let mut group = Element::new("staffGrp");
        if self.settings.staff == StaffStyle::Double {
            group.set_attr("symbol", "bracket");
            group.set_attr("bar.thru", "true");
        }
        for n in 1..=self.settings.staff.staff_count() {
            let mut staff_def = Element::new("staffDef")
                .with_attr("n", n.to_string())
                .with_attr("lines", "5");
            if n == 1 {
                staff_def.set_attr("dir.dist", "4");
            }
            for (key, value) in &tab_def.attributes {
                if key.starts_with("meter.") || key.starts_with("mensur.") {
                    staff_def.set_attr(key, value.as_str());
                }
            }
            staff_def.push(self.clef(n));
            staff_def.push(
                Element::new("keySig")
                    .with_attr("sig", self.settings.key.mei_sig())
                    .with_attr("mode", self.settings.key.mode.name()),
            );
            if let Some(sign) = tab_def.child("meterSig").or_else(|| tab_def.child("mensur")) {
                staff_def.push(sign.clone());
            }
            group.push(staff_def);
        }
        group
    }

    fn clef(&self, n: usize) -> Element {
        match (self.settings.staff, n) {
            (StaffStyle::Single, _) => Element::new("clef")
                .with_attr("shape", "G")
                .with_attr("line", "2")
                .with_attr("dis", "8")
                .with_attr("dis.place", "below"),
            (StaffStyle::Double, 1) => Element::new("clef")
                .with_attr("shape", "G")
                .with_attr("line", "2"),
            (StaffStyle::Double, _) => Element::new("clef")
                .with_attr("shape", "F")
                .with_attr("line", "4"),
        }
    }

    fn tab_staff_def(&self, tab_def: &Element, path: &str) -> Result<Element, TranscribeError> {
        let mut staff_def = tab_def.clone();
        let n = staff_def
            .attr("n")
            .and_then(|n| parse_token(parse_unsigned, n))
            .ok_or_else(|| TranscribeError::malformed(path, "missing or invalid @n"))?;
        let shifted = n as usize + self.settings.tab_staff_shift();
        staff_def.set_attr("n", shifted.to_string());

        if staff_def.attr("notationtype") == Some(NotationType::German.mei_value()) {
            log::warn!("German tablature is written as {}", self.settings.notation);
            for attribute in ["lines.visible", "notationsubtype", "valign"] {
                staff_def.remove_attr(attribute);
            }
        }
        let five_lines =
            staff_def.attr("lines") == Some("5") && self.settings.notation == NotationType::French;
        staff_def.set_attr("lines", if five_lines { "5" } else { "6" });
        staff_def.set_attr("notationtype", self.settings.notation.mei_value());

        let tuning = self.tuning_element();
        let position = staff_def.children.iter().position(
            |child| matches!(child, Node::Element(element) if element.name == "tuning"),
        );
        match position {
            Some(index) => staff_def.children[index] = Node::Element(tuning),
            None => staff_def.children.insert(0, Node::Element(tuning)),
        }
        Ok(staff_def)
    }

    fn tuning_element(&self) -> Element {
        let mut tuning = Element::new("tuning");
        for (index, (letter, accidental, octave)) in
            self.settings.tuning.courses().into_iter().enumerate()
        {
            let mut course = Element::new("course")
                .with_attr("n", (index + 1).to_string())
                .with_attr("pname", letter.name())
                .with_attr("oct", octave.to_string());
            if let Some(accid) = accidental.mei() {
                course.set_attr("accid", accid);
            }
            tuning.push(course);
        }
        tuning
    }
}

/// Meter of the tablature staff: `meterSig`, then `@meter.count`/`@meter.unit`
/// on the staff definition or the score definition.
fn read_meter(tab_def: &Element, score_def: &Element) -> Option<TimeSignature> {
    if let Some(meter_sig) = tab_def.child("meterSig") {
        let meter = count_and_unit(meter_sig, "count", "unit").or_else(|| {
            match meter_sig.attr("sym") {
                Some("common") => Some(TimeSignature::new(4, 4)),
                Some("cut") => Some(TimeSignature::new(2, 2)),
                _ => None,
            }
        });
        if meter.is_some() {
            return meter;
        }
        log::warn!("Ignoring unreadable meterSig");
    }
    count_and_unit(tab_def, "meter.count", "meter.unit")
        .or_else(|| count_and_unit(score_def, "meter.count", "meter.unit"))
}

fn count_and_unit(element: &Element, count: &str, unit: &str) -> Option<TimeSignature> {
    let count = parse_token(parse_unsigned, element.attr(count)?)?;
    let unit = parse_token(parse_unsigned, element.attr(unit)?)?;
    (count > 0 && unit > 0).then_some(TimeSignature::new(count, unit))
}
