//! Built-in practice banks used when generation is unavailable

use crate::types::{ListeningItem, PracticeDifficulty, SpeakingItem};

/// (text, English translation)
type Phrase = (&'static str, Option<&'static str>);

struct SpeakingBank {
    language: &'static str,
    beginner: &'static [Phrase],
    intermediate: &'static [Phrase],
    advanced: &'static [Phrase],
}

/// (prayer, question, options, correct index)
type Question = (&'static str, &'static str, &'static [&'static str], usize);

struct ListeningBank {
    language: &'static str,
    questions: &'static [Question],
}

const ENGLISH: SpeakingBank = SpeakingBank {
    language: "en",
    beginner: &[
        ("Our Father, who art in heaven", None),
        ("Hallowed be thy name", None),
        ("Thy kingdom come, thy will be done", None),
        ("Give us this day our daily bread", None),
        ("The Lord is my shepherd", None),
    ],
    intermediate: &[
        ("Forgive us our trespasses, as we forgive those who trespass against us", None),
        ("The Lord is my shepherd; I shall not want", None),
        ("He maketh me to lie down in green pastures", None),
        ("Hail Mary, full of grace, the Lord is with thee", None),
        ("Glory be to the Father, and to the Son, and to the Holy Spirit", None),
    ],
    advanced: &[
        (
            "Yea, though I walk through the valley of the shadow of death, I will fear no evil: for thou art with me",
            None,
        ),
        (
            "Lord, make me an instrument of your peace: where there is hatred, let me sow love; where there is injury, pardon",
            None,
        ),
        (
            "Blessed art thou among women, and blessed is the fruit of thy womb, Jesus. Holy Mary, Mother of God, pray for us sinners",
            None,
        ),
    ],
};

const SPANISH: SpeakingBank = SpeakingBank {
    language: "es",
    beginner: &[
        ("Padre nuestro que estás en el cielo", Some("Our Father who art in heaven")),
        ("Santificado sea tu nombre", Some("Hallowed be thy name")),
        ("Venga a nosotros tu reino", Some("Thy kingdom come")),
        ("El Señor es mi pastor", Some("The Lord is my shepherd")),
    ],
    intermediate: &[
        (
            "Hágase tu voluntad en la tierra como en el cielo",
            Some("Thy will be done on earth as it is in heaven"),
        ),
        (
            "Dios te salve, María, llena eres de gracia, el Señor es contigo",
            Some("Hail Mary, full of grace, the Lord is with thee"),
        ),
        (
            "Perdona nuestras ofensas, como también nosotros perdonamos a los que nos ofenden",
            Some("Forgive us our trespasses, as we forgive those who trespass against us"),
        ),
    ],
    advanced: &[
        (
            "Aunque ande en valle de sombra de muerte, no temeré mal alguno, porque tú estarás conmigo",
            Some("Though I walk through the valley of the shadow of death, I will fear no evil, for you are with me"),
        ),
        (
            "Señor, hazme un instrumento de tu paz: donde haya odio, que yo ponga amor; donde haya ofensa, perdón",
            Some("Lord, make me an instrument of your peace: where there is hatred, let me sow love; where there is injury, pardon"),
        ),
    ],
};

const FRENCH: SpeakingBank = SpeakingBank {
    language: "fr",
    beginner: &[
        ("Notre Père qui es aux cieux", Some("Our Father who art in heaven")),
        ("Que ton nom soit sanctifié", Some("Hallowed be thy name")),
        ("Que ton règne vienne", Some("Thy kingdom come")),
    ],
    intermediate: &[
        (
            "Je vous salue Marie, pleine de grâce, le Seigneur est avec vous",
            Some("Hail Mary, full of grace, the Lord is with thee"),
        ),
        (
            "Que ta volonté soit faite sur la terre comme au ciel",
            Some("Thy will be done on earth as it is in heaven"),
        ),
    ],
    advanced: &[(
        "Pardonne-nous nos offenses, comme nous pardonnons aussi à ceux qui nous ont offensés, et ne nous laisse pas entrer en tentation",
        Some("Forgive us our trespasses, as we forgive those who trespass against us, and lead us not into temptation"),
    )],
};

const ARABIC: SpeakingBank = SpeakingBank {
    language: "ar",
    beginner: &[
        (
            "بسم الله الرحمن الرحيم",
            Some("In the name of God, the Most Gracious, the Most Merciful"),
        ),
        ("الحمد لله رب العالمين", Some("All praise is due to God, Lord of the worlds")),
        ("سبحان ربي العظيم", Some("Glory be to my Lord, the Almighty")),
    ],
    intermediate: &[(
        "الرحمن الرحيم مالك يوم الدين إياك نعبد وإياك نستعين",
        Some("The Most Gracious, the Most Merciful, Master of the Day of Judgment. You alone we worship, and You alone we ask for help"),
    )],
    advanced: &[(
        "اهدنا الصراط المستقيم صراط الذين أنعمت عليهم غير المغضوب عليهم ولا الضالين",
        Some("Guide us to the straight path, the path of those You have blessed, not of those who earned anger, nor of those who went astray"),
    )],
};

const SPEAKING_BANKS: &[SpeakingBank] = &[ENGLISH, SPANISH, FRENCH, ARABIC];

const ENGLISH_LISTENING: ListeningBank = ListeningBank {
    language: "en",
    questions: &[
        (
            "The Lord is my shepherd; I shall not want. He maketh me to lie down in green pastures: he leadeth me beside the still waters.",
            "Where does the shepherd lead?",
            &["Beside the still waters", "Into the desert", "Up the mountain", "Across the sea"],
            0,
        ),
        (
            "Give us this day our daily bread, and forgive us our trespasses, as we forgive those who trespass against us.",
            "What is asked for each day?",
            &["Peace", "Daily bread", "Wisdom", "Rain"],
            1,
        ),
        (
            "Lord, make me an instrument of your peace: where there is hatred, let me sow love.",
            "What should be sown where there is hatred?",
            &["Hope", "Faith", "Love", "Joy"],
            2,
        ),
    ],
};

const SPANISH_LISTENING: ListeningBank = ListeningBank {
    language: "es",
    questions: &[
        (
            "El Señor es mi pastor, nada me falta. En verdes praderas me hace descansar.",
            "¿Dónde me hace descansar el Señor?",
            &["En verdes praderas", "En el desierto", "En la montaña", "En el mar"],
            0,
        ),
        (
            "Danos hoy nuestro pan de cada día y perdona nuestras ofensas.",
            "¿Qué pedimos para hoy?",
            &["Paz", "Nuestro pan de cada día", "Sabiduría", "Lluvia"],
            1,
        ),
    ],
};

const LISTENING_BANKS: &[ListeningBank] = &[ENGLISH_LISTENING, SPANISH_LISTENING];

/// Speaking phrases for `language`, or the English bank if none matches
pub fn speaking_bank(language: &str, difficulty: PracticeDifficulty) -> Vec<SpeakingItem> {
    let bank = SPEAKING_BANKS
        .iter()
        .find(|bank| bank.language == language)
        .unwrap_or(&ENGLISH);

    let phrases = match difficulty {
        PracticeDifficulty::Beginner => bank.beginner,
        PracticeDifficulty::Intermediate => bank.intermediate,
        PracticeDifficulty::Advanced => bank.advanced,
    };

    phrases
        .iter()
        .map(|(text, translation)| SpeakingItem {
            text: text.to_string(),
            translation: translation.map(String::from),
            difficulty,
        })
        .collect()
}

/// Listening questions for `language`, or the English bank if none matches
pub fn listening_bank(language: &str) -> Vec<ListeningItem> {
    let bank = LISTENING_BANKS
        .iter()
        .find(|bank| bank.language == language)
        .unwrap_or(&ENGLISH_LISTENING);

    bank.questions
        .iter()
        .map(|(prayer, question, options, correct)| ListeningItem {
            prayer_text: prayer.to_string(),
            question: question.to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
            correct_index: *correct,
        })
        .collect()
}

/// Whether a dedicated speaking bank exists for `language`
pub fn has_speaking_bank(language: &str) -> bool {
    SPEAKING_BANKS.iter().any(|bank| bank.language == language)
}
