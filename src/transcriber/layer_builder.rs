use crate::parser::mei_tree::Element;
use crate::transcriber::beam_grouper::LayerItem;
use crate::transcriber::staff_splitter::{Directive, NotatedEvent, NotatedNote};

/// Notehead `<staff>` with a single layer.
pub fn staff_element(n: usize, items: Vec<LayerItem>) -> Element {
    let layer = items
        .into_iter()
        .fold(Element::new("layer").with_attr("n", "1"), |layer, item| {
            layer.with_child(item_element(item))
        });
    Element::new("staff")
        .with_attr("n", n.to_string())
        .with_child(layer)
}

fn item_element(item: LayerItem) -> Element {
    match item {
        LayerItem::Event(event) => event_element(event),
        LayerItem::Beam(events) => events
            .into_iter()
            .fold(Element::new("beam"), |beam, event| {
                beam.with_child(event_element(event))
            }),
        LayerItem::MeasureRest { id } => Element::new("mRest").with_attr("xml:id", id),
    }
}

fn event_element(event: NotatedEvent) -> Element {
    let (name, id, duration, dots, notes) = match event {
        NotatedEvent::Chord {
            id,
            duration,
            dots,
            notes,
        } => ("chord", id, duration, dots, notes),
        NotatedEvent::Rest { id, duration, dots } => ("rest", id, duration, dots, vec![]),
        NotatedEvent::Space { id, duration, dots } => ("space", id, duration, dots, vec![]),
    };
    let mut element = Element::new(name).with_attr("dur", duration.token());
    if dots > 0 {
        element.set_attr("dots", dots.to_string());
    }
    if name == "chord" {
        element.set_attr("stem.visible", "false");
    }
    element.set_attr("xml:id", id);
    notes
        .iter()
        .fold(element, |chord, note| chord.with_child(note_element(note)))
}

fn note_element(note: &NotatedNote) -> Element {
    let spelling = note.spelling;
    let mut element = Element::new("note")
        .with_attr("pname", spelling.letter.name())
        .with_attr("oct", spelling.octave.to_string())
        .with_attr("head.fill", "solid");
    if let Some(accid) = spelling.accidental.mei() {
        element.set_attr("accid", accid);
    }
    element
}

/// `<dir>` above the staves holding the flag glyphs.
pub fn directive_element(directive: &Directive) -> Element {
    directive.glyphs.iter().fold(
        Element::new("dir")
            .with_attr("place", "above")
            .with_attr("startid", format!("#{}", directive.start_id)),
        |dir, glyph| {
            dir.with_child(
                Element::new("symbol")
                    .with_attr("glyph.auth", "smufl")
                    .with_attr("glyph.name", *glyph),
            )
        },
    )
}
