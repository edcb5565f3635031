use crate::diagnosis::{BrightnessLevel, Gender, HaircolorOption, HairstyleOption};
use crate::llm::schema::Schema;

#[derive(Debug, Clone, PartialEq)]
pub struct PromptSpec {
    pub system_instruction: Option<String>,
    pub instruction_text: String,
    pub output_contract: Option<Schema>,
}

const DIAGNOSIS_SYSTEM_PROMPT: &str = r#"You are a senior hair stylist, personal color analyst and image consultant working in a premium salon.

You receive photos and short videos of one client (front, side and back views) and must produce a professional diagnosis followed by concrete proposals.

### ANALYSIS
1. Face: shape, distinctive features and the overall impression the face gives.
2. Skeleton: body frame type (straight, wave or natural), its features and the body line.
3. Personal color: season type, undertone and the characteristics that led to it.
4. Hair condition: texture, volume, damage and the current brightness level.

### PROPOSAL
1. Two hairstyles (style1, style2) that suit the face and skeleton analysis.
2. Two hair colors (color1, color2) that suit the personal color, each with a recommended brightness level.
3. A palette of four flattering colors with hex codes (#RRGGBB).
4. Makeup suggestions for base, eye, lip and cheek.
5. Fashion suggestions: recommended styles, recommended items and one piece of advice.
6. A warm closing comment addressed to the client.

### BRIGHTNESS LEVEL SCALE
Always express hair brightness using exactly one label from this scale, written as "Level N (Name)":
{level_scale}
Use this scale for both the current level and every recommended level.

### RULES
- Base every statement on what is visible in the photos and videos.
- Keep each value short: one or two sentences at most.
- Return only JSON that matches the response schema. Every field is required."#;

const IMAGE_GENERATION_SYSTEM_PROMPT: &str = "You are a photo retoucher specialised in hairstyle simulations. Edit the provided photo; never generate a different person. CRITICAL: respond with an image, NOT TEXT.";

const REFINEMENT_SYSTEM_PROMPT: &str = "You are a photo retoucher. Apply only the requested change to the provided image. CRITICAL: respond with an image, NOT TEXT.";

pub fn brightness_scale_text() -> String {
    BrightnessLevel::all()
        .map(|level| format!("- {level}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn level_description(subject: &str) -> String {
    format!(
        "{subject}, written as \"Level N (Name)\" using the 9-step scale: {}",
        BrightnessLevel::all()
            .map(|level| level.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    )
}

fn short_text(description: &str) -> Schema {
    Schema::string(description)
}

fn hairstyle_schema(label: &str) -> Schema {
    Schema::object([
        ("name", short_text(&format!("Name of the {label} hairstyle"))),
        (
            "description",
            short_text("Why it suits the client and how it is cut and styled"),
        ),
    ])
}

fn haircolor_schema(label: &str) -> Schema {
    Schema::object([
        ("name", short_text(&format!("Name of the {label} hair color"))),
        (
            "description",
            short_text("Why the color suits the client's personal color"),
        ),
        (
            "recommendedLevel",
            short_text(&level_description("Recommended brightness level")),
        ),
    ])
}

fn palette_color_schema() -> Schema {
    Schema::object([
        ("name", short_text("Color name")),
        ("hex", short_text("Hex code in #RRGGBB form")),
    ])
}

pub fn diagnosis_schema() -> Schema {
    let analysis = Schema::object([
        (
            "face",
            Schema::object([
                ("shape", short_text("Face shape")),
                ("features", short_text("Distinctive facial features")),
                ("impression", short_text("Overall impression of the face")),
            ]),
        ),
        (
            "skeleton",
            Schema::object([
                ("type", short_text("Body frame type: straight, wave or natural")),
                ("features", short_text("Features of the body frame")),
                ("bodyLine", short_text("Description of the body line")),
            ]),
        ),
        (
            "personalColor",
            Schema::object([
                ("season", short_text("Season type: spring, summer, autumn or winter")),
                ("undertone", short_text("Yellow-based or blue-based undertone")),
                ("characteristics", short_text("What led to this personal color")),
            ]),
        ),
        (
            "hairCondition",
            Schema::object([
                ("texture", short_text("Hair texture")),
                ("volume", short_text("Hair volume")),
                ("damage", short_text("Visible damage")),
                (
                    "currentLevel",
                    short_text(&level_description("Current brightness level")),
                ),
            ]),
        ),
    ]);

    let proposal = Schema::object([
        (
            "hairstyles",
            Schema::object([
                ("style1", hairstyle_schema("first")),
                ("style2", hairstyle_schema("second")),
            ]),
        ),
        (
            "haircolors",
            Schema::object([
                ("color1", haircolor_schema("first")),
                ("color2", haircolor_schema("second")),
            ]),
        ),
        (
            "palette",
            Schema::object([
                ("color1", palette_color_schema()),
                ("color2", palette_color_schema()),
                ("color3", palette_color_schema()),
                ("color4", palette_color_schema()),
            ]),
        ),
        (
            "makeup",
            Schema::object([
                ("base", short_text("Foundation and base makeup")),
                ("eye", short_text("Eye makeup")),
                ("lip", short_text("Lip color")),
                ("cheek", short_text("Cheek color")),
            ]),
        ),
        (
            "fashion",
            Schema::object([
                (
                    "recommendedStyles",
                    Schema::array(short_text("Fashion style")),
                ),
                (
                    "recommendedItems",
                    Schema::array(short_text("Clothing item or accessory")),
                ),
                ("advice", short_text("One piece of fashion advice")),
            ]),
        ),
        ("comment", short_text("Closing comment addressed to the client")),
    ]);

    Schema::object([("analysis", analysis), ("proposal", proposal)])
}

pub fn build_diagnosis_prompt(gender: Gender, free_text_request: Option<&str>) -> PromptSpec {
    let mut system = DIAGNOSIS_SYSTEM_PROMPT.replace("{level_scale}", &brightness_scale_text());
    let request = free_text_request
        .map(str::trim)
        .filter(|text| !text.is_empty());
    if request.is_some() {
        system.push_str(
            "\n- The client wrote a personal request. It MUST be reflected in the hairstyles, the hair colors and the closing comment.",
        );
    }

    let mut instruction = format!(
        "Diagnose the client shown in the attached photos and videos.\nGender: {}.",
        gender.label()
    );
    if let Some(request) = request {
        instruction.push_str(&format!("\nClient request: \"{request}\""));
    }
    instruction.push_str("\nThe attachments follow, each introduced by a short caption.");

    PromptSpec {
        system_instruction: Some(system),
        instruction_text: instruction,
        output_contract: Some(diagnosis_schema()),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ImagePromptInput<'a> {
    pub hairstyle: &'a HairstyleOption,
    pub haircolor: &'a HaircolorOption,
    pub current_level: &'a str,
    pub customization: Option<&'a str>,
    pub has_inspiration: bool,
}

pub fn build_image_generation_prompt(input: ImagePromptInput<'_>) -> PromptSpec {
    let mut text = format!(
        "Edit the attached photo of the client into a photorealistic hairstyle simulation.\n\
         Keep the face, facial identity, expression, skin, clothing, background, lighting and camera angle exactly as they are. Change ONLY the hair.\n\n\
         Hairstyle: {} - {}\n\
         Hair color: {} - {}\n\
         Brightness: the hair is currently {}; render it at {}.\n",
        input.hairstyle.name.trim(),
        input.hairstyle.description.trim(),
        input.haircolor.name.trim(),
        input.haircolor.description.trim(),
        BrightnessLevel::canonical_label(input.current_level),
        BrightnessLevel::canonical_label(&input.haircolor.recommended_level)
    );

    if let Some(customization) = input
        .customization
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        text.push_str(&format!("Additional request from the client: {customization}\n"));
    }

    if input.has_inspiration {
        text.push_str(
            "A second image is attached as inspiration. Borrow its hairstyle mood, but keep the client from the first image.\n",
        );
    }

    text.push_str("The result must look like a real photograph with natural hair texture and strands.");

    PromptSpec {
        system_instruction: Some(IMAGE_GENERATION_SYSTEM_PROMPT.to_string()),
        instruction_text: text,
        output_contract: None,
    }
}

pub fn build_refinement_prompt(change: &str) -> PromptSpec {
    let text = format!(
        "Apply the following change to the attached image only: {}\nKeep everything else exactly as it is: the face, identity, expression, background, clothing and lighting. Return the edited photo.",
        change.trim()
    );
    PromptSpec {
        system_instruction: Some(REFINEMENT_SYSTEM_PROMPT.to_string()),
        instruction_text: text,
        output_contract: None,
    }
}

pub fn variant_switch_instruction(target: &HaircolorOption) -> String {
    format!(
        "change the hair color to {} ({}), at {}. Keep the hairstyle and cut unchanged",
        target.name.trim(),
        target.description.trim(),
        BrightnessLevel::canonical_label(&target.recommended_level)
    )
}
