/// A fixed camera angle and the wording appended to the style prompt for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewDescriptor {
    pub label: &'static str,
    pub prompt_suffix: &'static str,
}

pub const VIEW_COUNT: usize = 4;

pub static VIEWS: [ViewDescriptor; VIEW_COUNT] = [
    ViewDescriptor {
        label: "Front View",
        prompt_suffix: "front view of the head and shoulders",
    },
    ViewDescriptor {
        label: "Left Side View",
        prompt_suffix: "side profile view from the left",
    },
    ViewDescriptor {
        label: "Right Side View",
        prompt_suffix: "side profile view from the right",
    },
    ViewDescriptor {
        label: "Back View",
        prompt_suffix: "view from the back of the head",
    },
];

impl ViewDescriptor {
    pub fn build_prompt(&self, style_description: &str) -> String {
        format!(
            "On this person's headshot, give them a new hairstyle: {}. The view should be a {}. Maintain the person's facial features.",
            style_description,
            self.prompt_suffix
        )
    }
}
